use lanesim_world::*;

fn main() {
    let templates = match lane_templates() {
        Ok(templates) => templates,
        Err(e) => {
            eprintln!("Failed to build lane templates: {}", e);
            return;
        }
    };

    for (name, lane) in &templates {
        println!("{} (length {:.4}, {} control points)", name, lane.length(), lane.control_points().len());

        // Sample beyond both ends to show the linear extrapolation
        let n = lane.control_points().len() as f64;
        let (lo, hi) = (-2.0, n + 1.0);
        let samples = 20;
        for k in 0..samples {
            let beta = lo + (hi - lo) * k as f64 / (samples - 1) as f64;
            println!("  beta {:>6.3}: {}", beta, lane.point_at(beta));
        }

        let probe = LanePose::new(lane.length() / 2.0, 0.05, 0.2);
        match lane
            .absolute_from_lane_pose(&probe)
            .and_then(|pose| lane.lane_pose_from_absolute(&pose, lane.width() / 2.0).map(|back| (pose, back)))
        {
            Ok((pose, back)) => println!("  {} -> {} -> {}", probe, pose, back),
            Err(e) => eprintln!("  Round trip failed: {}", e),
        }
    }
}
