#![cfg(feature = "test-utils")]

use std::sync::Arc;
use std::time::{Duration, Instant};

use syrx_postgres::prelude::*;
use syrx_postgres::test_utils::{setup_postgres_embedded, stop_postgres_embedded};

struct WidgetRepository;

fn services(connection_string: &str) -> ServiceProvider {
    let connection_string = connection_string.to_string();
    let mut services = ServiceCollection::new();
    services.use_syrx(|syrx| {
        syrx.use_postgres(|b| {
            b.add_connection_string("widgets", connection_string).add_command(|c| {
                c.for_type::<WidgetRepository>(|t| {
                    t.for_method("insert", |m| {
                        m.use_command_text("INSERT INTO widgets (id, name) VALUES ($1, $2)")
                            .use_connection_alias("widgets")
                    })
                    .for_method("insert_checked", |m| {
                        m.use_command_text(
                            "INSERT INTO widgets (id, name) VALUES ($1, ($2::bigint / 0)::text)",
                        )
                        .use_connection_alias("widgets")
                    })
                    .for_method("add", |m| {
                        m.use_command_text("add_widget")
                            .use_connection_alias("widgets")
                            .use_command_type(CommandType::StoredProcedure)
                    })
                    .for_method("by_id", |m| {
                        m.use_command_text("SELECT id, name FROM widgets WHERE id = $1")
                            .use_connection_alias("widgets")
                    })
                    .for_method("count", |m| {
                        m.use_command_text("SELECT count(*) AS n FROM widgets")
                            .use_connection_alias("widgets")
                    })
                    .for_method("slow", |m| {
                        m.use_command_text("SELECT pg_sleep(10)")
                            .use_connection_alias("widgets")
                            .use_command_timeout(1)
                    })
                    .for_method("slow_rename", |m| {
                        m.use_command_text(
                            "UPDATE widgets SET name = $1 \
                             WHERE id IN (SELECT w.id FROM widgets w, pg_sleep(10))",
                        )
                        .use_connection_alias("widgets")
                        .use_command_timeout(1)
                    })
                })
            })
        })
    });
    services.build_service_provider()
}

#[test]
fn postgres_commands_run_against_embedded_server() -> Result<(), Box<dyn std::error::Error>> {
    let pg = setup_postgres_embedded("syrx_test")?;
    let provider = services(&pg.connection_string);

    let rt = tokio::runtime::Runtime::new()?;
    let outcome = rt.block_on(async {
        let connector = provider.get::<dyn DatabaseConnector>()?;
        let commander = provider.commander::<WidgetRepository>()?;

        let mut connection = connector.create_connection(&commander.setting("insert")?)?;
        assert_eq!(connection.state(), ConnectionState::Closed);
        connection.open().await?;
        assert_eq!(connection.state(), ConnectionState::Open);
        connection
            .execute_batch(
                "CREATE TABLE widgets (id BIGINT PRIMARY KEY, name TEXT NOT NULL);
                 CREATE PROCEDURE add_widget(p_id BIGINT, p_name TEXT)
                 LANGUAGE sql AS $$ INSERT INTO widgets (id, name) VALUES (p_id, p_name) $$;",
            )
            .await?;
        connection.close().await?;
        assert_eq!(connection.state(), ConnectionState::Closed);

        let inserted = commander
            .execute("insert", &[RowValues::Int(1), RowValues::Text("sprocket".into())])
            .await?;
        assert_eq!(inserted, 1);

        commander
            .execute("add", &[RowValues::Int(2), RowValues::Text("gear".into())])
            .await?;

        let rs = commander.query("by_id", &[RowValues::Int(2)]).await?;
        assert_eq!(rs.len(), 1);
        assert_eq!(rs.results[0].get("name").and_then(RowValues::as_text), Some("gear"));
        assert_eq!(rs.results[0].get("id").and_then(RowValues::as_int), Some(&2));

        // The failing insert is rolled back.
        let err = commander
            .execute("insert_checked", &[RowValues::Int(3), RowValues::Int(7)])
            .await
            .unwrap_err();
        match &err {
            SyrxDbError::PostgresError(e) => {
                assert_eq!(e.code(), Some(&tokio_postgres::error::SqlState::DIVISION_BY_ZERO));
            }
            other => panic!("expected a postgres error, got {other:?}"),
        }
        let rs = commander.query("count", &[]).await?;
        assert_eq!(rs.results[0].get("n").and_then(RowValues::as_int), Some(&2));

        // A timed-out statement is cancelled on the server, so the call
        // returns close to the limit rather than when the statement ends.
        let started = Instant::now();
        let err = commander.query("slow", &[]).await.unwrap_err();
        assert!(matches!(err, SyrxDbError::Timeout(_)));
        let elapsed = started.elapsed();
        assert!(elapsed < Duration::from_secs(5), "timeout of 1s took {elapsed:?}");

        let started = Instant::now();
        let err = commander
            .execute("slow_rename", &[RowValues::Text("stalled".into())])
            .await
            .unwrap_err();
        assert!(matches!(err, SyrxDbError::Timeout(_)));
        let elapsed = started.elapsed();
        assert!(elapsed < Duration::from_secs(5), "timeout of 1s took {elapsed:?}");

        // The cancelled update is rolled back.
        let rs = commander.query("by_id", &[RowValues::Int(2)]).await?;
        assert_eq!(rs.results[0].get("name").and_then(RowValues::as_text), Some("gear"));

        Ok::<(), SyrxDbError>(())
    });

    stop_postgres_embedded(pg);
    outcome?;
    Ok(())
}

#[test]
fn connections_from_one_connector_are_independent() -> Result<(), Box<dyn std::error::Error>> {
    let pg = setup_postgres_embedded("syrx_independent")?;
    let provider = services(&pg.connection_string);

    let rt = tokio::runtime::Runtime::new()?;
    let outcome = rt.block_on(async {
        let connector = provider.get::<dyn DatabaseConnector>()?;
        let setting = CommandSetting::new("SELECT 1 AS one", "widgets")?;

        let mut first = connector.create_connection(&setting)?;
        let mut second = connector.create_connection(&setting)?;
        first.open().await?;
        second.open().await?;

        first.close().await?;
        assert_eq!(first.state(), ConnectionState::Closed);
        assert_eq!(second.state(), ConnectionState::Open);

        let rs = second.query(&setting, &[]).await?;
        assert_eq!(rs.results[0].get("one").and_then(RowValues::as_int), Some(&1));
        second.close().await?;

        let err = first.query(&setting, &[]).await.unwrap_err();
        assert!(matches!(err, SyrxDbError::ConnectionError(_)));
        Ok::<(), SyrxDbError>(())
    });

    stop_postgres_embedded(pg);
    outcome?;
    Ok(())
}

#[test]
fn unreachable_server_fails_on_open() -> Result<(), Box<dyn std::error::Error>> {
    let settings = CommanderSettingsBuilder::build(|b| {
        b.add_connection_string("dead", "Host=127.0.0.1;Port=1;Database=none;Timeout=2")
    })?;
    let connector = PostgresConnector::new(Arc::new(settings), PostgresFactory);
    let setting = CommandSetting::new("SELECT 1", "dead")?;

    let mut connection = connector.new_connection(&setting)?;
    let rt = tokio::runtime::Runtime::new()?;
    let err = rt.block_on(connection.open()).unwrap_err();
    assert!(matches!(err, SyrxDbError::PostgresError(_)));
    assert_eq!(connection.state(), ConnectionState::Closed);
    Ok(())
}
