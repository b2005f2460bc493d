use argh::FromArgs;
use glam::DVec3;
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::{
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use posekit::annotator::{AnnotationScene, AnnotatorSettings, Command, CommandOutcome, Modifiers};
use posekit::k3d::{
    camera::PinholeCameraIntrinsic,
    depth::{depth_to_point_set, DepthImage},
    PointSet, RigidTransform,
};

#[derive(FromArgs)]
/// Annotate the pose of a synthetic object: pick, solve, nudge and refine
struct Args {
    /// number of points sampled on the model
    #[argh(option, default = "500")]
    num_points: usize,

    /// largest per-axis error of the scene picks, in meters
    #[argh(option, default = "0.002")]
    pick_noise: f64,

    /// seed of the random generator
    #[argh(option, default = "0")]
    seed: u64,

    /// optional path to a JSON settings file
    #[argh(option)]
    settings: Option<PathBuf>,

    /// space separated key presses, `s-` holds rotate and `c-` holds coarse, e.g. "f c-l s-m r"
    #[argh(option, default = "String::from(\"f r\")")]
    keys: String,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args: Args = argh::from_env();

    let settings = match &args.settings {
        Some(path) => AnnotatorSettings::from_json_file(path)?,
        None => AnnotatorSettings::default(),
    };

    let mut rng = StdRng::seed_from_u64(args.seed);

    // a 10x8x6 cm box, sampled on its volume
    let model = (0..args.num_points)
        .map(|_| {
            DVec3::new(
                rng.random_range(0.0..0.10),
                rng.random_range(0.0..0.08),
                rng.random_range(0.0..0.06),
            )
        })
        .collect::<PointSet>();
    let model = Arc::new(model);

    let ground_truth = RigidTransform::from_axis_angle(
        DVec3::new(0.2, 1.0, -0.3),
        25f64.to_radians(),
        DVec3::new(-0.05, 0.02, 1.0),
    )?;

    // a wall 1.5 m in front of the depth camera behind the object
    let intrinsic = PinholeCameraIntrinsic::new((80.0, 80.0), (40.0, 30.0), (80, 60));
    let depth = DepthImage::new(vec![1500.0; 80 * 60], 80, 60)?;
    let wall = depth_to_point_set(&depth, &intrinsic, 1e-3)?;

    let scene_points = model
        .transformed(&ground_truth)
        .iter()
        .chain(wall.iter())
        .copied()
        .collect::<PointSet>();
    println!(
        "Scene: #{} points, model: #{} points",
        scene_points.len(),
        model.len()
    );

    let mut scene = AnnotationScene::new(scene_points, settings);
    let id = scene.add_object("synthetic_box", model.clone());

    // pick four spread out model points and their noisy scene counterparts
    let picks = farthest_points(&model, 4);
    if let Some(object) = scene.active_mut() {
        for index in picks {
            let point = object.add_model_pick_index(index)?;
            let noise = DVec3::new(
                rng.random_range(-1.0..1.0),
                rng.random_range(-1.0..1.0),
                rng.random_range(-1.0..1.0),
            ) * args.pick_noise;
            object.add_scene_pick(ground_truth.transform_point(point) + noise);
        }
    }

    // create a cancel token to stop a long refinement
    let cancel_token = Arc::new(AtomicBool::new(false));

    ctrlc::set_handler({
        let cancel_token = cancel_token.clone();
        move || {
            println!("Received Ctrl-C signal. Sending cancel signal !!");
            cancel_token.store(true, Ordering::SeqCst);
        }
    })?;

    for token in args.keys.split_whitespace() {
        let Some((key, modifiers)) = parse_key(token) else {
            log::warn!("ignoring malformed key {token:?}");
            continue;
        };
        let Some(command) = Command::from_key(key, modifiers) else {
            log::warn!("key {token:?} is not mapped");
            continue;
        };

        let now = std::time::Instant::now();
        match scene.handle_command_cancellable(command, modifiers, &cancel_token) {
            Ok(CommandOutcome::Refined(result)) => println!(
                "{token}: refined in {} iterations, fitness {:.4}, rmse {:.6} (cancelled: {})",
                result.num_iterations, result.fitness, result.rmse, result.cancelled
            ),
            Ok(outcome) => {
                let (angle, distance) = outcome.pose().distance_to(&ground_truth);
                println!(
                    "{token}: {:.3} deg / {:.4} m from the ground truth",
                    angle.to_degrees(),
                    distance
                );
            }
            Err(err) => println!("{token}: {err}"),
        }
        log::debug!("elapsed: {:?}", now.elapsed());
    }

    if let Some(label) = scene.instance_label(id) {
        if let Some(object) = scene.get(id) {
            let (angle, distance) = object.pose().distance_to(&ground_truth);
            println!(
                "Final pose of {label}: {:.4} deg / {:.6} m from the ground truth",
                angle.to_degrees(),
                distance
            );
            println!("{}", object.pose().to_homogeneous());
        }
    }

    Ok(())
}

/// Parse `c-s-k` style tokens into a key and a modifier snapshot.
fn parse_key(token: &str) -> Option<(char, Modifiers)> {
    let mut modifiers = Modifiers::NONE;
    let mut rest = token;
    loop {
        if let Some(stripped) = rest.strip_prefix("s-") {
            modifiers.rotate = true;
            rest = stripped;
        } else if let Some(stripped) = rest.strip_prefix("c-") {
            modifiers.coarse = true;
            rest = stripped;
        } else {
            break;
        }
    }

    let mut chars = rest.chars();
    match (chars.next(), chars.next()) {
        (Some(key), None) => Some((key, modifiers)),
        _ => None,
    }
}

/// Greedy farthest point sampling, starting from the first point.
fn farthest_points(points: &PointSet, count: usize) -> Vec<usize> {
    let mut selected = Vec::with_capacity(count);
    if points.is_empty() {
        return selected;
    }
    selected.push(0);
    let mut distances = points
        .iter()
        .map(|p| p.distance_squared(points.points()[0]))
        .collect::<Vec<_>>();

    while selected.len() < count.min(points.len()) {
        let Some((next, _)) = distances
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
        else {
            break;
        };
        selected.push(next);
        let anchor = points.points()[next];
        for (d, p) in distances.iter_mut().zip(points.iter()) {
            *d = d.min(p.distance_squared(anchor));
        }
    }
    selected
}
