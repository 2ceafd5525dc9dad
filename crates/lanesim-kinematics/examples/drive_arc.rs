use lanesim_kinematics::*;

fn main() {
    let wheel_radius = 0.1;
    let axle_length = 0.5;
    let kinematics_result = DifferentialDrive::new(wheel_radius, axle_length);

    let mut state = KinematicState::at_rest(Pose::new(0.0, 0.0, 0.0));
    let command = WheelVelocityCommand::new(5.0, 10.0); // right wheel faster: left turn
    let dt = 0.25; // Time step in seconds
    let num_steps = 12;

    match kinematics_result {
        Ok(kinematics) => {
            println!("Initializing simulation...");
            println!("  {}", kinematics);
            println!("  Command:      {}", command);
            println!("  Body twist:   {}", kinematics.twist_from_wheel_velocities(command));
            println!("  Initial pose: {}", state.pose);
            println!("\nSimulating...");

            for i in 0..num_steps {
                match kinematics.integrate(&state, command, dt) {
                    Ok(next) => {
                        state = next;
                        println!("Step {:>2}: {}", i + 1, state);
                    }
                    Err(e) => {
                        eprintln!("Error during simulation step {}: {}", i + 1, e);
                        break;
                    }
                }
            }

            // One long step lands on the same arc as the many short ones
            let single = kinematics
                .update_pose(Pose::identity(), kinematics.twist_from_wheel_velocities(command), dt * num_steps as f64);
            println!("\nFinal pose (stepped): {}", state.pose);
            match single {
                Ok(pose) => println!("Final pose (single):  {}", pose),
                Err(e) => eprintln!("Single-step integration failed: {}", e),
            }
        }
        Err(e) => {
            eprintln!("Failed to initialize kinematics: {}", e);
            eprintln!("Please ensure wheel_radius ({}) and axle_length ({}) are positive.", wheel_radius, axle_length);
        }
    }
}
