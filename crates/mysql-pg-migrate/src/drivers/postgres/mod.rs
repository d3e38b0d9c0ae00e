//! PostgreSQL target driver.
//!
//! - [`PostgresWriter`]: live target sink using tokio-postgres
//!
//! TLS follows PostgreSQL's `sslmode` names: `disable`, `require`,
//! `verify-ca` and `verify-full`.

mod tls;
mod writer;

pub use tls::SslMode;
pub use writer::PostgresWriter;
