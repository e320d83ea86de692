// PostgreSQL binding
//
// - connection_string: Npgsql/libpq connection string parsing
// - connection: the factory, connector alias and session handle
// - params: RowValues -> tokio-postgres parameters
// - query: rows -> ResultSet

pub mod connection;
pub mod connection_string;
pub mod params;
pub mod query;

pub use connection::{PostgresConnection, PostgresConnector, PostgresFactory};
pub use connection_string::parse_connection_string;
pub use params::Params;
pub use query::build_result_set;
