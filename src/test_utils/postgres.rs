use postgresql_embedded::PostgreSQL;

use super::SHARED_RUNTIME;

/// A running embedded `PostgreSQL` instance.
pub struct EmbeddedPostgres {
    pub postgresql: PostgreSQL,
    pub port: u16,
    /// Npgsql-style connection string for the test database.
    pub connection_string: String,
}

/// Start an embedded `PostgreSQL` server and create `db_name` on it.
///
/// # Errors
/// Returns an error if the server cannot be set up or started, or the database
/// cannot be created.
pub fn setup_postgres_embedded(db_name: &str) -> Result<EmbeddedPostgres, Box<dyn std::error::Error>> {
    SHARED_RUNTIME.block_on(async {
        let mut postgresql = PostgreSQL::default();
        postgresql.setup().await?;
        postgresql.start().await?;
        postgresql.create_database(db_name).await?;

        let settings = postgresql.settings();
        let port = settings.port;
        let connection_string = format!(
            "Host={};Port={port};Database={};Username={};Password={}",
            settings.host,
            quote_value(db_name),
            quote_value(&settings.username),
            quote_value(&settings.password),
        );
        println!("PostgreSQL started on port {port}");

        Ok(EmbeddedPostgres {
            postgresql,
            port,
            connection_string,
        })
    })
}

/// Stop a previously started embedded `PostgreSQL` instance.
pub fn stop_postgres_embedded(postgres: EmbeddedPostgres) {
    let EmbeddedPostgres { postgresql, .. } = postgres;
    SHARED_RUNTIME.block_on(async move {
        let _ = postgresql.stop().await;
    });
}

/// Quote a connection string value when it contains separators or quotes.
fn quote_value(value: &str) -> String {
    if value.contains([';', '\'', '"']) || value.trim() != value {
        format!("'{}'", value.replace('\'', "''"))
    } else {
        value.to_string()
    }
}
