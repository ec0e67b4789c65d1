//! Terminal rendering shared by both pages.

use chrono::{Local, TimeZone};
use indicatif::{ProgressBar, ProgressStyle};

use crate::contacts::{ConnectionRequest, Contact};
use crate::file_transfer::StoredFile;
use crate::notice::Notice;
use crate::utils;

pub const NO_CONTACTS: &str = "No contacts yet. Add a contact to start chatting!";
pub const NO_REQUESTS: &str = "No pending requests.";

/// Local wall-clock time of a millisecond timestamp
pub fn format_time(millis: u64) -> String {
    match Local.timestamp_millis_opt(millis as i64).single() {
        Some(time) => time.format("%H:%M").to_string(),
        None => "--:--".to_string(),
    }
}

pub fn format_date(millis: u64) -> String {
    match Local.timestamp_millis_opt(millis as i64).single() {
        Some(time) => time.format("%Y-%m-%d %H:%M").to_string(),
        None => "unknown date".to_string(),
    }
}

pub fn contacts_list(contacts: &[Contact]) -> String {
    if contacts.is_empty() {
        return NO_CONTACTS.to_string();
    }
    let mut out = format!("Contacts ({})\n", contacts.len());
    for contact in contacts {
        out.push_str(&format!(
            "  {:<20} Peer ID: {:<20} added {}\n",
            contact.display_name(),
            contact.peer_id,
            format_date(contact.timestamp)
        ));
    }
    out
}

pub fn requests_list(requests: &[ConnectionRequest]) -> String {
    if requests.is_empty() {
        return NO_REQUESTS.to_string();
    }
    let mut out = format!("Pending requests [{}]\n", requests.len());
    for request in requests {
        out.push_str(&format!(
            "  {:<20} Peer ID: {:<20} {}\n",
            request.display_name(),
            request.peer_id,
            format_date(request.timestamp)
        ));
    }
    out
}

pub fn file_line(file_id: &str, file: &StoredFile) -> String {
    let kind = file.kind();
    format!(
        "  {} {} ({}) [{}]{}{}",
        kind.icon(),
        file.meta.name,
        utils::format_file_size(file.meta.size),
        file_id,
        if file.is_received() { " received" } else { " sent" },
        if kind.is_previewable() { ", previewable" } else { "" }
    )
}

pub fn print_notice(notice: &Notice) {
    println!("{}", notice);
}

/// Percent bar for one file transfer
pub fn transfer_bar(title: &str) -> ProgressBar {
    let bar = ProgressBar::new(100);
    let style = ProgressStyle::default_bar()
        .template("{msg} [{bar:40.cyan/blue}] {pos}%")
        .map(|style| style.progress_chars("#>-"))
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    bar.set_style(style);
    bar.set_message(title.to_string());
    bar
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_states() {
        assert_eq!(contacts_list(&[]), NO_CONTACTS);
        assert_eq!(requests_list(&[]), NO_REQUESTS);
    }

    #[test]
    fn test_requests_badge() {
        let requests = vec![ConnectionRequest::new("bob", "bob"), ConnectionRequest::new("carol", "")];
        let text = requests_list(&requests);
        assert!(text.starts_with("Pending requests [2]"));
        assert!(text.contains("carol"));
    }
}
