mod cli;

use std::io;

use clap::Parser;
use cluster::{JobName, NodeConfig, Role};
use log::{error, info};
use machine_learning::dataset::Mnist;
use parameter_server::ParameterServer;
use tokio::signal;
use worker::Worker;

use crate::cli::Args;

#[tokio::main]
async fn main() -> io::Result<()> {
    env_logger::init();
    let args = Args::parse();

    if args.download_only {
        Mnist::prepare(&args.data_dir)?;
        info!("dataset ready at {}", args.data_dir.display());
        return Ok(());
    }

    let (rank, size) = args.world()?;
    let launcher = args.launcher(rank)?;
    let node = NodeConfig::resolve(&launcher, rank, size, args.fanout, args.devices_per_host)?;

    match node.role() {
        Role::ParameterServer { task_index } => {
            let port = node.cluster().task_port(JobName::Ps, task_index)?;
            let server = ParameterServer::bind(("0.0.0.0", port), task_index).await?;

            tokio::select! {
                res = server.join() => {
                    let Err(e) = res;
                    error!("parameter server stopped: {e}");
                    Err(e)
                }
                _ = signal::ctrl_c() => {
                    info!("interrupted, shutting down");
                    Ok(())
                }
            }
        }
        Role::Worker { task_index } => {
            let config = args.worker_config(&node, task_index);
            let report = Worker::new(config).run().await?;

            info!(
                worker = task_index, local_steps = report.local_steps, global_step = report.global_step;
                "trained in {:.3} s", report.elapsed.as_secs_f64()
            );
            Ok(())
        }
    }
}
