pub mod asset;
pub mod assignment;
pub mod attendance;
pub mod attendance_record;
pub mod breaks;
pub mod dashboard;
pub mod employee;
pub mod flowace;
pub mod issue;
pub mod role;
pub mod tag;
pub mod upload;
pub mod warning;
pub mod work_log;
