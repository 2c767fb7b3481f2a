pub mod dashboard_cache;
pub mod db_utils;
pub mod validation;
