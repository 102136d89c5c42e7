mod device;
mod dto;
mod poll_service;
mod proto;
mod rpc_client;
mod rpc_server;
mod util;

use std::{env, process::exit, sync::Arc};

use device::DeviceChannel;
use poll_service::PollService;
use tokio::{
    signal,
    task::{spawn_blocking, JoinError},
};
use tracing::{error, info, warn};
use util::{
    config::{device_settings, get_config, service_settings},
    setup_tracing,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    setup_tracing();

    if let (Some(git_describe), Some(git_sha), Some(build_timestamp)) = (
        option_env!("VERGEN_GIT_DESCRIBE"),
        option_env!("VERGEN_GIT_SHA"),
        option_env!("VERGEN_BUILD_TIMESTAMP"),
    ) {
        info!("tpoller {} ({} {})", git_describe, git_sha, build_timestamp);
    }

    let ref args: Vec<String> = env::args().collect();

    let choice = args.get(1).map(|a| a.clone()).unwrap_or("serve".into());

    match choice.as_str() {
        "serve" => handle_result(serve().await),
        "sample" => handle_result(sample().await),
        "poll" => handle_result(poll().await),
        _ => println!("Make a valid choice (serve, sample, poll)"),
    }

    Ok(())
}

fn handle_result(res: anyhow::Result<()>) {
    if let Err(err) = res {
        let code = exit_code(&err);
        if code == 2 {
            error!("An internal error occurred: {:?}", err);
        } else {
            error!("An error occurred: {:?}", err);
        }
        exit(code)
    }
}

/// 2 when a worker task died, 1 for every other failure.
fn exit_code(err: &anyhow::Error) -> i32 {
    if err.is::<JoinError>() {
        2
    } else {
        1
    }
}

async fn open_device() -> anyhow::Result<DeviceChannel> {
    let settings = device_settings()?;
    let channel = spawn_blocking(move || DeviceChannel::open(&settings)).await??;
    Ok(channel)
}

async fn serve() -> anyhow::Result<()> {
    let rpc_addr = get_config().get_string("rpc_addr")?;
    let listener = rpc_server::bind(&rpc_addr).await?;

    let channel = open_device().await?;
    let service = Arc::new(PollService::new(channel, service_settings()?));

    rpc_server::start_server(listener, service.clone(), shutdown_signal()).await?;

    if !service.is_idle() {
        warn!("Waiting for the last device read to complete");
    }

    match Arc::into_inner(service).and_then(PollService::into_channel) {
        Some(channel) => {
            info!("Releasing device {}", channel.model_id());
            drop(channel);
        }
        None => warn!("Device still in use at shutdown"),
    }
    Ok(())
}

/// Polls the device once without starting the server and prints the result.
async fn sample() -> anyhow::Result<()> {
    let mut channel = open_device().await?;

    let (record, readings) = spawn_blocking(move || {
        let record = channel.read_record()?;
        let readings = record
            .clone()
            .map(|record| channel.reshape(record))
            .unwrap_or_default();
        Ok::<_, device::DeviceError>((record, readings))
    })
    .await??;

    match record {
        Some(record) => println!("{}", record.describe()),
        None => println!("Device returned no record"),
    }
    for reading in readings {
        println!("{}", reading);
    }
    Ok(())
}

/// Calls `PollOnce` on a running server, logging every datum received.
async fn poll() -> anyhow::Result<()> {
    let rpc_addr = get_config().get_string("rpc_addr")?;
    let data = rpc_client::poll(&rpc_addr, rpc_client::POLL_TIMEOUT).await?;
    info!("Received {} data points", data.len());
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            error!("Unable to listen for Ctrl-C: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                error!("Unable to listen for SIGTERM: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Starting graceful shutdown now...");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn worker_failures_exit_with_two() {
        let task = tokio::spawn(std::future::pending::<()>());
        task.abort();
        let join_error = task.await.unwrap_err();

        let err: anyhow::Error = join_error.into();
        assert_eq!(exit_code(&err), 2);
    }

    #[test]
    fn other_failures_exit_with_one() {
        let device_failure: anyhow::Error = device::DeviceError::ReadTimeout.into();
        assert_eq!(exit_code(&device_failure), 1);
        assert_eq!(exit_code(&anyhow::anyhow!("bind failed")), 1);
    }
}
