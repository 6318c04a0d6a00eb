mod handler;
mod model;

pub use handler::{
    append_message, create_ticket, delete_ticket, get_ticket, list_tickets, mark_viewed,
    transition_status,
};
