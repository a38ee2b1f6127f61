//! Terminal output formatting.

use colored::Colorize;
use relay_client::Notification;
use relay_core::NotifyKind;

/// Print a notification as a one-line toast.
pub fn print_notification(notification: Notification) {
    let time = chrono::Local::now().format("%H:%M:%S");
    let label = match notification.kind {
        NotifyKind::Success => " OK ".black().on_green(),
        NotifyKind::Error => " !! ".white().on_red(),
    };
    println!("{} {} {}", time.to_string().dimmed(), label, notification.message);
}

/// Print the hub's reply to an emitted event.
pub fn print_emit_result(event: &str, accepted: bool, url: &str) {
    if accepted {
        println!("{} {} -> {}", "Sent".green().bold(), event.cyan(), url);
    } else {
        println!(
            "{} {} -> {} {}",
            "Not delivered".red().bold(),
            event.cyan(),
            url,
            "(is the hub running?)".dimmed()
        );
    }
}
