use anyhow::Context;
use azure_bridge::client::{MemoryBlobService, MemoryFileService, MemoryQueueService};
use azure_bridge::config::{CliConfig, Command};
use azure_bridge::core::registry::{blob_storage, file_storage, storage_settings};
use azure_bridge::core::{AZURE_CONNECTOR, BLOB_DRIVER, FILE_DRIVER};
use azure_bridge::utils::logger;
use azure_bridge::{
    AzureConfig, AzureConnector, ConnectionSettings, Filesystem, FilesystemManager, QueueManager,
    WriteOptions,
};
use bytes::Bytes;
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;

/// Disks `blob` and `file` and connection `azure`, all auto-creating.
/// `--memory` always runs on this; the services live for one invocation.
fn memory_config() -> AzureConfig {
    let mut config = AzureConfig::default();
    config.disks.insert(
        BLOB_DRIVER.to_string(),
        ConnectionSettings {
            driver: Some(BLOB_DRIVER.to_string()),
            container: Some("local".to_string()),
            auto_create_container: Some(true),
            ..Default::default()
        },
    );
    config.disks.insert(
        FILE_DRIVER.to_string(),
        ConnectionSettings {
            driver: Some(FILE_DRIVER.to_string()),
            share: Some("local".to_string()),
            auto_create_share: Some(true),
            ..Default::default()
        },
    );
    config.connections.insert(
        AZURE_CONNECTOR.to_string(),
        ConnectionSettings {
            queue: Some("default".to_string()),
            auto_create_queue: Some(true),
            ..Default::default()
        },
    );
    config
}

fn load_config(cli: &CliConfig) -> anyhow::Result<AzureConfig> {
    if cli.memory {
        return Ok(memory_config());
    }
    AzureConfig::from_file(&cli.config)
        .with_context(|| format!("Failed to load {}", cli.config.display()))
}

fn managers(cli: &CliConfig, config: AzureConfig) -> (FilesystemManager, QueueManager) {
    if !cli.memory {
        return (
            FilesystemManager::with_azure_drivers(config.clone()),
            QueueManager::with_azure_connector(config),
        );
    }

    let blobs = Arc::new(MemoryBlobService::new());
    let files = Arc::new(MemoryFileService::new());
    let defaults = config.credentials.overlay(&config.queue);

    let mut filesystems = FilesystemManager::new(config.clone());
    filesystems.extend(BLOB_DRIVER, move |config, disk| {
        let settings = storage_settings(config, BLOB_DRIVER, disk);
        let storage: Arc<dyn Filesystem> = Arc::new(blob_storage(blobs.clone(), &settings)?);
        Ok(storage)
    });
    filesystems.extend(FILE_DRIVER, move |config, disk| {
        let settings = storage_settings(config, FILE_DRIVER, disk);
        let storage: Arc<dyn Filesystem> = Arc::new(file_storage(files.clone(), &settings)?);
        Ok(storage)
    });

    let mut queues = QueueManager::new(config);
    queues.add_connector(
        AZURE_CONNECTOR,
        AzureConnector::with_client(defaults, Arc::new(MemoryQueueService::new())),
    );

    (filesystems, queues)
}

fn json_payload(payload: &str) -> anyhow::Result<serde_json::Value> {
    serde_json::from_str(payload).context("Payload must be valid JSON")
}

async fn run(cli: CliConfig) -> anyhow::Result<()> {
    let config = load_config(&cli)?;
    let (filesystems, queues) = managers(&cli, config);

    match cli.command {
        Command::Put {
            disk,
            path,
            file,
            mimetype,
        } => {
            let contents = tokio::fs::read(&file)
                .await
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let options = WriteOptions {
                mimetype,
                ..Default::default()
            };
            let mut entry = filesystems
                .disk(&disk)
                .await?
                .write(&path, Bytes::from(contents), &options)
                .await?;
            entry.contents = None;
            println!("{}", serde_json::to_string_pretty(&entry)?);
        }
        Command::Get { disk, path } => {
            let entry = filesystems.disk(&disk).await?.read(&path).await?;
            let contents = entry.contents.unwrap_or_default();
            println!("{}", String::from_utf8_lossy(&contents));
        }
        Command::Ls {
            disk,
            directory,
            recursive,
        } => {
            let entries = filesystems
                .disk(&disk)
                .await?
                .list_contents(&directory, recursive)
                .await?;
            for entry in entries {
                println!("{}", serde_json::to_string(&entry)?);
            }
        }
        Command::Stat { disk, path } => {
            let entry = filesystems.disk(&disk).await?.get_metadata(&path).await?;
            println!("{}", serde_json::to_string_pretty(&entry)?);
        }
        Command::Rm { disk, path } => {
            filesystems.disk(&disk).await?.delete(&path).await?;
            println!("Deleted {}", path);
        }
        Command::Mkdir { disk, path } => {
            let entry = filesystems
                .disk(&disk)
                .await?
                .create_dir(&path, &WriteOptions::default())
                .await?;
            println!("Created {}", entry.path);
        }
        Command::Rmdir { disk, path } => {
            filesystems.disk(&disk).await?.delete_dir(&path).await?;
            println!("Deleted {}", path);
        }
        Command::Cp { disk, from, to } => {
            filesystems.disk(&disk).await?.copy(&from, &to).await?;
            println!("Copied {} to {}", from, to);
        }
        Command::Mv { disk, from, to } => {
            filesystems.disk(&disk).await?.rename(&from, &to).await?;
            println!("Moved {} to {}", from, to);
        }
        Command::Push {
            connection,
            payload,
            queue,
        } => {
            let job = json_payload(&payload)?;
            queues
                .connection(&connection)
                .await?
                .push(&job, queue.as_deref())
                .await?;
            println!("Pushed");
        }
        Command::Later {
            connection,
            delay,
            payload,
            queue,
        } => {
            let job = json_payload(&payload)?;
            queues
                .connection(&connection)
                .await?
                .later(Duration::from_secs(delay), &job, queue.as_deref())
                .await?;
            println!("Scheduled in {}s", delay);
        }
        Command::Pop {
            connection,
            queue,
            release,
        } => {
            let popped = queues.connection(&connection).await?.pop(queue.as_deref()).await?;
            let Some(mut job) = popped else {
                println!("Queue is empty");
                return Ok(());
            };

            println!(
                "{} (attempt {}) from {}: {}",
                job.job_id(),
                job.attempts(),
                job.queue(),
                job.raw_body()?
            );
            match release {
                Some(delay) => job.release(Duration::from_secs(delay)).await?,
                None => job.delete().await?,
            }
        }
        Command::Size { connection, queue } => {
            let size = queues
                .connection(&connection)
                .await?
                .size(queue.as_deref())
                .await?;
            println!("{}", size);
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CliConfig::parse();

    if cli.json_logs {
        logger::init_json_logger();
    } else {
        logger::init_cli_logger(cli.verbose);
    }

    tracing::info!("Starting azure-bridge CLI");
    if cli.verbose {
        tracing::debug!("CLI config: {:?}", cli);
    }

    if let Err(e) = run(cli).await {
        tracing::error!("❌ {:#}", e);
        eprintln!("❌ {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn memory_cli(config: &std::path::Path) -> CliConfig {
        let config = config.to_string_lossy().to_string();
        CliConfig::parse_from(["azure-bridge", "--memory", "--config", &config, "size", "azure"])
    }

    #[test]
    fn test_memory_mode_ignores_config_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("azure.toml");
        std::fs::write(&path, "[connections.azure]\nqueue = \"jobs\"\n").unwrap();

        let config = load_config(&memory_cli(&path)).unwrap();
        let azure = config.connection(AZURE_CONNECTOR).unwrap();
        assert_eq!(azure.queue.as_deref(), Some("default"));
        assert_eq!(azure.auto_create_queue, Some(true));
    }

    #[tokio::test]
    async fn test_memory_mode_round_trips_within_one_invocation() {
        let dir = TempDir::new().unwrap();
        let cli = memory_cli(&dir.path().join("absent.toml"));
        let (filesystems, queues) = managers(&cli, load_config(&cli).unwrap());

        let disk = filesystems.disk(FILE_DRIVER).await.unwrap();
        disk.write("notes/a.txt", Bytes::from_static(b"hi"), &WriteOptions::default())
            .await
            .unwrap();
        assert_eq!(
            disk.read("notes/a.txt").await.unwrap().contents,
            Some(Bytes::from_static(b"hi"))
        );

        let queue = queues.connection(AZURE_CONNECTOR).await.unwrap();
        queue.push(&serde_json::json!({}), None).await.unwrap();
        assert_eq!(queue.size(None).await.unwrap(), 1);
    }
}
