#![doc = include_str!(concat!("../", env!("CARGO_PKG_README")))]

#[doc(inline)]
pub use posekit_linalg as linalg;

#[doc(inline)]
pub use posekit_3d as k3d;

#[doc(inline)]
pub use posekit_icp as icp;

#[doc(inline)]
pub use posekit_annotator as annotator;
