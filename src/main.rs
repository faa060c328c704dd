// Copyright 2026 Daniel Pelikan
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! SPP WiFi provisioning command-line client.

use anyhow::{bail, Result};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use spp_wifi_provisioner::bluetooth::{BluezAdapter, LinkManager};
use spp_wifi_provisioner::config::Config;
use spp_wifi_provisioner::events::{EventProcessor, EventSink};
use spp_wifi_provisioner::provisioning::ProvisioningSession;
use spp_wifi_provisioner::state::LinkStatus;

const USAGE: &str = "\
Usage: spp-provision [--device <name|address>] <command>

Commands:
  devices                      List bonded Bluetooth devices
  monitor                      Connect and log received lines until Ctrl-C
  provision <ssid> <password>  Send WiFi credentials and wait for the result
  send <text>                  Send one raw line and print the first reply";

/// What the user asked for.
#[derive(Debug, PartialEq, Eq)]
enum Action {
    Devices,
    Monitor,
    Provision { ssid: String, password: String },
    Send { text: String },
}

fn parse_args(args: &[String]) -> Result<(Action, Option<String>)> {
    let mut device = None;
    let mut rest = Vec::new();

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--device" | "-d" => match iter.next() {
                Some(value) => device = Some(value.clone()),
                None => bail!("--device needs a value\n\n{}", USAGE),
            },
            "--help" | "-h" => bail!("{}", USAGE),
            _ => rest.push(arg.clone()),
        }
    }

    let action = match rest.as_slice() {
        [cmd] if cmd == "devices" => Action::Devices,
        [cmd] if cmd == "monitor" => Action::Monitor,
        [cmd, ssid, password] if cmd == "provision" => Action::Provision {
            ssid: ssid.clone(),
            password: password.clone(),
        },
        [cmd, text] if cmd == "send" => Action::Send { text: text.clone() },
        _ => bail!("{}", USAGE),
    };

    Ok((action, device))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("spp_wifi_provisioner=info".parse()?),
        )
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let (action, device) = parse_args(&args)?;

    // Load configuration
    let config = Config::load()?;
    info!("Configuration loaded");

    let adapter = Arc::new(BluezAdapter::new(config.bluetooth.rfcomm_channel).await);

    // Single consumer for link events
    let status = LinkStatus::new();
    let (sink, event_rx) = EventSink::channel();
    let processor = EventProcessor::new(status.clone());
    tokio::spawn(processor.run(event_rx, |_| {}));

    let link = LinkManager::new(adapter, config.link.clone(), sink);

    if action == Action::Devices {
        for device in link.bonded_devices().await? {
            println!("{}", device);
        }
        return Ok(());
    }

    let criterion = device.unwrap_or_else(|| config.bluetooth.device_name.clone());
    link.connect(&criterion).await?;

    let outcome = match action {
        Action::Devices => Ok(()),
        Action::Monitor => monitor(&link).await,
        Action::Provision { ssid, password } => {
            let session = ProvisioningSession::new(link.clone(), &config.provisioning);
            match session.send_credentials(&ssid, &password).await {
                Ok(result) => {
                    println!("{}", result);
                    if result.is_success() {
                        Ok(())
                    } else {
                        Err(anyhow::anyhow!("provisioning did not succeed: {}", result))
                    }
                }
                Err(e) => Err(e.into()),
            }
        }
        Action::Send { text } => {
            let mut replies = link.subscribe();
            match link.send(&text).await {
                Ok(()) => {
                    let timeout = config.provisioning.response_timeout();
                    match tokio::time::timeout(timeout, replies.recv()).await {
                        Ok(Ok(reply)) => println!("{}", reply.text),
                        _ => println!("(no reply within {:?})", timeout),
                    }
                    Ok(())
                }
                Err(e) => Err(e.into()),
            }
        }
    };

    link.disconnect().await;
    info!("Final state: {}", status.get_state().as_str());
    outcome
}

/// Log received lines until Ctrl-C or the link goes away.
async fn monitor(link: &LinkManager<BluezAdapter>) -> Result<()> {
    let mut state = link.watch_state();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
                return Ok(());
            }
            changed = state.changed() => {
                if changed.is_err() || !state.borrow().is_connected() {
                    warn!("Link closed");
                    bail!("link closed");
                }
            }
        }
    }
}
