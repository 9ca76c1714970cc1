//! Database connection and initialization.

pub use coursehub_core::db::DatabaseError;

coursehub_core::define_database!(CourseDatabase, "Course database migrations complete");
