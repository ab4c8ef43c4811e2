use herald_core::{Banner, BannerSnapshot};

const MESSAGE_FIELDS: [&str; 3] = ["message", "text", "title"];

pub fn print_snapshot(snapshot: &BannerSnapshot, json: bool) -> Result<(), String> {
    if json {
        let output = serde_json::to_string_pretty(snapshot)
            .map_err(|e| format!("Failed to serialize banners: {}", e))?;
        println!("{}", output);
        return Ok(());
    }

    if snapshot.banners.is_empty() {
        println!("No banners.");
    }
    for banner in &snapshot.banners {
        println!("{}", format_banner(banner));
    }
    if snapshot.loading {
        println!("(waiting for the banner service...)");
    }
    if snapshot.has_dismissed_banners {
        println!("(some banners are dismissed; `herald undismiss` restores them)");
    }
    Ok(())
}

pub fn format_banner(banner: &Banner) -> String {
    let id = banner.id().unwrap_or("-");
    let mut line = format!("[{}] {}", banner.kind.icon(), id);
    if banner.priority != 0.0 {
        line.push_str(&format!(" (priority {})", banner.priority));
    }
    if let Some(message) = MESSAGE_FIELDS
        .iter()
        .find_map(|key| banner.extra.get(*key).and_then(|v| v.as_str()))
    {
        line.push_str(": ");
        line.push_str(message);
    }
    if !banner.dismissible {
        line.push_str(" [pinned]");
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use herald_core::BannerType;

    #[test]
    fn formats_kind_priority_and_message() {
        let banner = Banner::new("disk-low")
            .with_kind(BannerType::Warning)
            .with_priority(5.0)
            .with_field("message", "Disk almost full");
        assert_eq!(
            format_banner(&banner),
            "[warning] disk-low (priority 5): Disk almost full"
        );
    }

    #[test]
    fn marks_anonymous_and_pinned_banners() {
        let banner = Banner::anonymous()
            .with_dismissible(false)
            .with_field("title", "Maintenance tonight");
        assert_eq!(
            format_banner(&banner),
            "[info] -: Maintenance tonight [pinned]"
        );
    }
}
