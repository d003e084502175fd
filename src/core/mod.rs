pub mod cleaning;
pub mod db;
pub mod export;
pub mod timestamp;
