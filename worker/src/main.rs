use std::{env, io, num::NonZeroUsize, path::PathBuf, str::FromStr};

use log::info;
use tokio::signal;
use worker::{Worker, WorkerConfig};

const DEFAULT_PS_HOSTS: &str = "127.0.0.1:2322";
const DEFAULT_DATA_DIR: &str = "./mnist-data";
const SHARD_SIZE: NonZeroUsize = NonZeroUsize::new(4096).unwrap();

fn var<T>(name: &str, default: T) -> io::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(value) => value
            .parse()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e)),
        Err(_) => Ok(default),
    }
}

#[tokio::main]
async fn main() -> io::Result<()> {
    env_logger::init();

    let ps_addrs = env::var("PS_HOSTS")
        .unwrap_or_else(|_| DEFAULT_PS_HOSTS.to_string())
        .split(',')
        .map(|addr| addr.trim().to_string())
        .filter(|addr| !addr.is_empty())
        .collect();

    let worker_index = var("WORKER_INDEX", 0)?;
    let config = WorkerConfig {
        worker_index,
        is_chief: worker_index == 0,
        worker_count: var("WORKER_COUNT", 1)?,
        ps_addrs,
        visible_device: 0,
        data_dir: PathBuf::from(var("DATA_DIR", DEFAULT_DATA_DIR.to_string())?),
        hidden_units: var("HIDDEN_UNITS", 100)?,
        batch_size: var("BATCH_SIZE", 100)?,
        learning_rate: var("LEARNING_RATE", 0.01)?,
        train_steps: var("TRAIN_STEPS", 1000)?,
        shard_size: SHARD_SIZE,
        seed: match env::var("SEED") {
            Ok(_) => Some(var("SEED", 0)?),
            Err(_) => None,
        },
        validate: var("VALIDATE", false)?,
    };

    tokio::select! {
        ret = Worker::new(config).run() => {
            let report = ret?;
            info!("trained {} local steps in {:?}", report.local_steps, report.elapsed);
        }
        _ = signal::ctrl_c() => {
            info!("interrupted, shutting down");
        }
    }

    Ok(())
}
