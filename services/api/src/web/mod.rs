pub mod codes;
pub mod feed;
pub mod rest;
pub mod state;

// Re-export the handlers to make them easily accessible
// to the binary that will build the web server router.
pub use feed::feed_handler;
pub use rest::{
    analyze_handler, create_session_handler, get_session_handler, list_cycles_handler,
    list_responses_handler, list_sessions_handler, session_report_handler, submit_join_handler,
    verify_join_handler,
};
