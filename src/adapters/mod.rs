pub mod audit_log;
pub mod binance;
pub mod postgres;
pub mod yahoo;

pub use audit_log::AuditLog;
pub use binance::BinanceClient;
pub use postgres::TelemetryStore;
pub use yahoo::YahooClient;
