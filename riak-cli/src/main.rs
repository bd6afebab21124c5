//! Command-line access to a Riak node over HTTP

use anyhow::{bail, Context};
use clap::{Arg, ArgAction, ArgMatches, Command};
use riak_client::{ClientConfig, RiakClient, RiakError};
use serde_json::Value;
use std::io::Write;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

fn cli() -> Command {
    let bucket = || Arg::new("bucket").required(true).help("Bucket name");
    let key = || Arg::new("key").required(true).help("Object key");

    Command::new("riak")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Talk to a Riak node over its HTTP interface")
        .subcommand_required(true)
        .arg(
            Arg::new("config")
                .long("config")
                .value_name("PATH")
                .global(true)
                .help("JSON file with client settings"),
        )
        .arg(
            Arg::new("host")
                .long("host")
                .value_name("HOST")
                .global(true)
                .help("Node host [default: 127.0.0.1]"),
        )
        .arg(
            Arg::new("port")
                .long("port")
                .value_name("PORT")
                .global(true)
                .value_parser(clap::value_parser!(u16))
                .help("Node HTTP port [default: 8098]"),
        )
        .arg(
            Arg::new("prefix")
                .long("prefix")
                .value_name("PREFIX")
                .global(true)
                .help("Key/value interface prefix [default: riak]"),
        )
        .subcommand(Command::new("ping").about("Check that the node is up"))
        .subcommand(Command::new("buckets").about("List buckets holding data"))
        .subcommand(
            Command::new("get")
                .about("Print an object")
                .arg(bucket())
                .arg(key())
                .arg(
                    Arg::new("binary")
                        .long("binary")
                        .action(ArgAction::SetTrue)
                        .help("Write the raw body instead of decoding JSON"),
                ),
        )
        .subcommand(
            Command::new("put")
                .about("Store an object")
                .arg(bucket())
                .arg(key())
                .arg(Arg::new("value").required(true).help("Value to store"))
                .arg(
                    Arg::new("content-type")
                        .long("content-type")
                        .value_name("TYPE")
                        .default_value("application/json")
                        .help("Content type; anything but JSON is stored verbatim"),
                ),
        )
        .subcommand(Command::new("delete").about("Delete an object").arg(bucket()).arg(key()))
        .subcommand(Command::new("keys").about("List the keys of a bucket").arg(bucket()))
        .subcommand(Command::new("props").about("Print bucket properties").arg(bucket()))
}

fn load_config(matches: &ArgMatches) -> anyhow::Result<ClientConfig> {
    let mut config = match matches.get_one::<String>("config") {
        Some(path) => ClientConfig::from_json_file(path)
            .with_context(|| format!("Failed to load config from {}", path))?,
        None => ClientConfig::default(),
    };

    if let Some(host) = matches.get_one::<String>("host") {
        config = config.with_host(host.as_str());
    }
    if let Some(port) = matches.get_one::<u16>("port") {
        config = config.with_port(*port);
    }
    if let Some(prefix) = matches.get_one::<String>("prefix") {
        config = config.with_prefix(prefix.as_str());
    }
    Ok(config)
}

fn arg<'a>(matches: &'a ArgMatches, name: &str) -> anyhow::Result<&'a str> {
    matches
        .get_one::<String>(name)
        .map(String::as_str)
        .with_context(|| format!("Missing argument '{}'", name))
}

fn print_json(value: &Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn run(client: &RiakClient, command: &str, matches: &ArgMatches) -> anyhow::Result<()> {
    match command {
        "ping" => {
            if !client.is_alive() {
                bail!("No answer from {}", client.config().base_url());
            }
            println!("OK");
        }
        "buckets" => {
            for bucket in client.buckets()? {
                println!("{}", bucket.name());
            }
        }
        "get" => {
            let bucket = client.bucket(arg(matches, "bucket")?);
            let key = arg(matches, "key")?;
            let object = if matches.get_flag("binary") {
                bucket.get_binary(key, None)?
            } else {
                bucket.get(key, None)?
            };

            if !object.exists() {
                bail!("{}/{} not found", bucket.name(), key);
            }
            if object.has_siblings() {
                eprintln!(
                    "{} siblings, showing the first: {}",
                    object.sibling_count(),
                    object.sibling_tags().join(", ")
                );
            }
            match object.data() {
                Some(value) => print_json(value)?,
                None => std::io::stdout().write_all(object.body())?,
            }
        }
        "put" => {
            let bucket = client.bucket(arg(matches, "bucket")?);
            let key = arg(matches, "key")?;
            let value = arg(matches, "value")?;
            let content_type = arg(matches, "content-type")?;

            let mut object = if content_type == "application/json" {
                let data: Value = serde_json::from_str(value).context("Value is not valid JSON")?;
                bucket.new_object(Some(key), data)
            } else {
                bucket.new_binary(Some(key), value.as_bytes().to_vec(), content_type)
            };
            object.store(None, None)?;
            info!("Stored {}/{} (status {:?})", bucket.name(), key, object.status());
            if object.has_siblings() {
                eprintln!("Stored with {} siblings", object.sibling_count());
            }
        }
        "delete" => {
            let bucket = client.bucket(arg(matches, "bucket")?);
            let key = arg(matches, "key")?;
            bucket.new_object(Some(key), Value::Null).delete(None)?;
        }
        "keys" => {
            for key in client.bucket(arg(matches, "bucket")?).keys()? {
                println!("{}", key);
            }
        }
        "props" => {
            let props = client.bucket(arg(matches, "bucket")?).properties()?;
            print_json(&Value::Object(props))?;
        }
        other => bail!("Unknown command '{}'", other),
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let matches = cli().get_matches();
    let config = load_config(&matches)?;
    debug!("Using node {} with client id {}", config.base_url(), config.client_id);

    let base_url = config.base_url();
    let client = RiakClient::new(config)?;
    let (command, sub_matches) = matches
        .subcommand()
        .context("No command given")?;

    run(&client, command, sub_matches).map_err(|e| {
        let unreachable = e
            .downcast_ref::<RiakError>()
            .is_some_and(RiakError::is_connectivity);
        if unreachable {
            e.context(format!("Is a node listening on {}?", base_url))
        } else {
            e
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        cli().debug_assert();
    }

    #[test]
    fn test_flags_override_config() {
        let matches = cli()
            .try_get_matches_from(["riak", "--host", "db1", "--port", "8087", "keys", "users"])
            .unwrap();
        let config = load_config(&matches).unwrap();
        assert_eq!(config.host, "db1");
        assert_eq!(config.port, 8087);
        assert_eq!(config.prefix, "riak");

        let (command, sub) = matches.subcommand().unwrap();
        assert_eq!(command, "keys");
        assert_eq!(arg(sub, "bucket").unwrap(), "users");
    }

    #[test]
    fn test_put_defaults_to_json() {
        let matches = cli()
            .try_get_matches_from(["riak", "put", "b", "k", "{\"a\":1}"])
            .unwrap();
        let (_, sub) = matches.subcommand().unwrap();
        assert_eq!(arg(sub, "content-type").unwrap(), "application/json");
    }

    #[test]
    fn test_missing_config_file_is_reported() {
        let matches = cli()
            .try_get_matches_from(["riak", "--config", "/nonexistent/riak.json", "ping"])
            .unwrap();
        assert!(load_config(&matches).is_err());
    }
}
