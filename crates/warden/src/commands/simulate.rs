//! Simulate command - run calls through an intercepted echo service.
//!
//! The service has a single method that replies with the metadata it
//! received, so the output shows exactly what the interceptor wrote.

use anyhow::{Context as _, Result};
use clap::Args;
use tracing::debug;
use warden_rpc::{
    MethodTable, ServerCall, ServiceDefinition, Status, WardenConfig, method_fn,
};
use warden_session::CacheStats;

use super::Context;

/// Arguments for the simulate command.
#[derive(Args, Debug)]
pub struct SimulateArgs {
    /// Method name to call
    #[arg(long, default_value = "Echo")]
    pub method: String,

    /// Peer address the calls come from
    #[arg(long, default_value = "127.0.0.1:50051")]
    pub peer: String,

    /// Session token to send as `authorization`
    #[arg(long)]
    pub authorization: Option<String>,

    /// User seed to send as `userid`
    #[arg(long)]
    pub userid: Option<String>,

    /// Number of calls to make
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    pub repeat: u32,
}

/// Result of one simulated call.
#[derive(Debug)]
pub enum CallOutcome {
    /// The handler ran; metadata as it saw it.
    Dispatched(Vec<(String, String)>),
    /// The call completed with a status.
    Rejected(Status),
}

/// Run the simulate command.
pub async fn run(args: SimulateArgs, ctx: &Context) -> Result<()> {
    let config = ctx.load_config()?;
    let (outcomes, stats) = simulate(&config, &args).await?;

    for (i, outcome) in outcomes.iter().enumerate() {
        match outcome {
            CallOutcome::Dispatched(metadata) => {
                println!("call {}: OK", i + 1);
                for (key, value) in metadata {
                    println!("  {key}: {value}");
                }
            }
            CallOutcome::Rejected(status) => println!("call {}: {status}", i + 1),
        }
    }

    println!();
    println!(
        "sessions: {} live, {} created, {} evicted",
        stats.size, stats.created, stats.evicted
    );
    Ok(())
}

async fn simulate(
    config: &WardenConfig,
    args: &SimulateArgs,
) -> Result<(Vec<CallOutcome>, CacheStats)> {
    let adapter = config
        .build_adapter()
        .context("failed to build interceptor from configuration")?;

    let definition = ServiceDefinition::new("warden.Echo").with_method(args.method.clone());
    let (_, methods) = adapter.adapt(definition, echo_table(&args.method));
    let method = methods
        .get(&args.method)
        .with_context(|| format!("method {} not registered", args.method))?;

    let mut outcomes = Vec::with_capacity(args.repeat as usize);
    for _ in 0..args.repeat {
        let mut call = ServerCall::new(args.peer.clone());
        if let Some(token) = &args.authorization {
            call = call.with_metadata("authorization", token.clone());
        }
        if let Some(userid) = &args.userid {
            call = call.with_metadata("userid", userid.clone());
        }

        let reply = method
            .invoke(call)
            .await
            .with_context(|| format!("call to {} failed", args.method))?;

        outcomes.push(match reply {
            Ok(body) => CallOutcome::Dispatched(parse_echo(&body)),
            Err(status) => CallOutcome::Rejected(status),
        });
    }

    let sessions = adapter.interceptor().sessions();
    let stats = sessions.stats();
    debug!(calls = outcomes.len(), sessions = stats.size, "Simulation finished");
    sessions.shutdown().await;

    Ok((outcomes, stats))
}

/// A table with one method that replies with its metadata, one
/// `key=value` per line.
fn echo_table(method: &str) -> MethodTable {
    let mut methods = MethodTable::new();
    methods.insert(
        method.to_string(),
        method_fn(|call: ServerCall| async move {
            let body = call
                .metadata()
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect::<Vec<_>>()
                .join("\n");
            Ok(Ok(body.into_bytes()))
        }),
    );
    methods
}

fn parse_echo(body: &[u8]) -> Vec<(String, String)> {
    String::from_utf8_lossy(body)
        .lines()
        .filter_map(|line| line.split_once('='))
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use warden_rpc::{Code, PolicyConfig};

    fn args(authorization: Option<&str>, userid: Option<&str>, repeat: u32) -> SimulateArgs {
        SimulateArgs {
            method: "Echo".to_string(),
            peer: "10.0.0.5:9".to_string(),
            authorization: authorization.map(str::to_string),
            userid: userid.map(str::to_string),
            repeat,
        }
    }

    fn get<'a>(metadata: &'a [(String, String)], key: &str) -> Option<&'a str> {
        metadata
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    #[tokio::test]
    async fn test_repeated_calls_share_session() {
        let (outcomes, stats) = simulate(&WardenConfig::default(), &args(None, None, 3))
            .await
            .unwrap();

        assert_eq!(outcomes.len(), 3);
        assert_eq!(stats.size, 1);
        assert_eq!(stats.created, 1);

        let node_ids: Vec<_> = outcomes
            .iter()
            .map(|o| match o {
                CallOutcome::Dispatched(m) => get(m, "nodeid").unwrap().to_string(),
                CallOutcome::Rejected(s) => panic!("unexpected rejection: {s}"),
            })
            .collect();
        assert!(node_ids.windows(2).all(|w| w[0] == w[1]));
    }

    #[tokio::test]
    async fn test_token_and_userid_rewritten() {
        let (outcomes, _) = simulate(
            &WardenConfig::default(),
            &args(Some("abc123"), Some("alice"), 1),
        )
        .await
        .unwrap();

        let CallOutcome::Dispatched(metadata) = &outcomes[0] else {
            panic!("expected dispatch");
        };
        let node = warden_identity::derive("abc123").unwrap();
        let user = warden_identity::derive("alice").unwrap();
        assert_eq!(get(metadata, "nodeid"), Some(node.public_id().as_str()));
        assert_eq!(get(metadata, "cacheid"), Some(node.public_id().as_str()));
        assert_eq!(get(metadata, "userid"), Some(user.public_id().as_str()));
        assert_eq!(get(metadata, "authorization"), Some("abc123"));
    }

    #[tokio::test]
    async fn test_deny_policy_from_config_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[policy]\nkind = \"deny_all\"").unwrap();
        let config = warden_rpc::load_config(Some(file.path())).unwrap();
        assert_eq!(config.policy, PolicyConfig::DenyAll);

        let (outcomes, stats) = simulate(&config, &args(Some("abc123"), None, 2))
            .await
            .unwrap();

        for outcome in &outcomes {
            match outcome {
                CallOutcome::Rejected(status) => {
                    assert_eq!(status.code(), Code::Unauthenticated);
                    assert_eq!(status.message(), "Invalid token");
                }
                CallOutcome::Dispatched(_) => panic!("denied call reached handler"),
            }
        }
        assert_eq!(stats.created, 1);
    }

    #[test]
    fn test_parse_echo() {
        let parsed = parse_echo(b"a=1\nb=x=y\nnoequals");
        assert_eq!(
            parsed,
            vec![
                ("a".to_string(), "1".to_string()),
                ("b".to_string(), "x=y".to_string()),
            ]
        );
    }
}
