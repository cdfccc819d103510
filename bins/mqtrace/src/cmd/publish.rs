use capture_api::{HistoryStore, Message, PubSubClient, QoS};
use capture_store::{DataRoot, FileStore};

use crate::config::{AppConfig, PublishArgs};
use crate::error::CliError;

pub async fn run(root: DataRoot, args: PublishArgs) -> Result<(), CliError> {
    let qos = QoS::from_u8(args.qos).ok_or_else(|| CliError::Config {
        context: "qos",
        detail: format!("expected 0, 1 or 2, got {}", args.qos),
    })?;
    let app = AppConfig::load(&root.config_file())?;
    let profile = app.profile(args.profile.as_deref())?;
    let store = FileStore::open(root.clone(), &profile.name)?;

    let (client, relay) = super::broker_client(&root, &profile, args.direct).await?;
    let sent = async {
        client.connect().await?;
        client
            .publish(&args.topic, qos, args.retain, args.payload.as_bytes())
            .await?;
        client.disconnect().await
    }
    .await;
    super::stop_relay(relay).await;
    sent?;

    let id = store.append(Message::publish(args.topic.as_str(), args.payload.as_str()).retained(args.retain))?;
    tracing::info!(id, topic = %args.topic, "published");
    store.close()?;
    Ok(())
}
