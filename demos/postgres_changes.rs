use supabase_realtime_client::{
    ChannelAction, EventPayload, PostgresChangeEvent, PostgresChangesFilter, RealtimeClient,
    RealtimeClientOptions,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let client = RealtimeClient::new(
        "wss://your-project.supabase.co/realtime/v1",
        RealtimeClientOptions {
            api_key: "your-anon-key".to_string(),
            ..Default::default()
        },
    )?;

    println!("Connecting to Supabase Realtime...");
    client.connect().await?;
    println!("Connected!");

    // Listen for every change on public.todos
    let channel = client.channel("db:todos", Default::default()).await;
    channel
        .on_postgres_changes(
            PostgresChangesFilter::new(PostgresChangeEvent::All, "public").table("todos"),
            |payload| {
                if let EventPayload::PostgresChange(change) = payload {
                    match &change.action {
                        ChannelAction::Insert { record, .. } => {
                            println!("Inserted: {:?}", record);
                        }
                        ChannelAction::Update {
                            record, old_record, ..
                        } => {
                            println!("Updated: {:?} -> {:?}", old_record, record);
                        }
                        ChannelAction::Delete { old_record, .. } => {
                            println!("Deleted: {:?}", old_record);
                        }
                        ChannelAction::Select { record, .. } => {
                            println!("Selected: {:?}", record);
                        }
                    }
                }
                Ok(())
            },
        )
        .await;
    channel.subscribe().await?;
    println!("Subscribed, waiting for changes (ctrl-c to quit)...");

    tokio::signal::ctrl_c().await?;

    client.disconnect().await?;
    Ok(())
}
