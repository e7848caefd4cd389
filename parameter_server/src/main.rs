use std::{env, io};

use log::error;
use parameter_server::ParameterServer;

const DEFAULT_ADDR: &str = "0.0.0.0:2322";

#[tokio::main]
async fn main() -> io::Result<()> {
    env_logger::init();

    let mut args = env::args().skip(1);
    let addr = args.next().unwrap_or_else(|| DEFAULT_ADDR.to_string());
    let task_index = match args.next() {
        Some(index) => index
            .parse()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?,
        None => 0,
    };

    let server = ParameterServer::bind(addr, task_index).await?;

    tokio::select! {
        res = server.join() => {
            let Err(e) = res;
            error!("parameter server stopped: {e}");
            Err(e)
        }
        _ = tokio::signal::ctrl_c() => Ok(()),
    }
}
