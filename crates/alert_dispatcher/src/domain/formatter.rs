use anyhow::{anyhow, Result};
use chrono::FixedOffset;
use common::domain::{Alert, AlertType};

/// Renders alerts as chat messages in Telegram's HTML parse mode
#[derive(Debug, Clone, Copy)]
pub struct AlertMessageFormatter {
    offset: FixedOffset,
}

impl AlertMessageFormatter {
    /// `utc_offset_minutes` is the local offset timestamps are shown in, e.g. -180 for UTC-3
    pub fn new(utc_offset_minutes: i32) -> Result<Self> {
        let offset = utc_offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .ok_or_else(|| anyhow!("invalid UTC offset: {} minutes", utc_offset_minutes))?;
        Ok(Self { offset })
    }

    pub fn format(&self, alert: &Alert, device_name: Option<&str>) -> String {
        let mut text = format!(
            "{} <b>{}</b>: {}",
            icon(alert.alert_type),
            alert.alert_type.label(),
            escape_html(&alert.value)
        );

        if let Some(name) = device_name.map(str::trim).filter(|n| !n.is_empty()) {
            text.push_str(&format!("\n📱 Device: {}", escape_html(name)));
        }

        text.push_str("\n\n");
        text.push_str(&escape_html(&detail(alert)));

        let local = alert.created_at.with_timezone(&self.offset);
        text.push_str(&format!("\n\n🕐 {}", local.format("%d/%m/%y %H:%M")));

        text
    }
}

fn icon(alert_type: AlertType) -> &'static str {
    match alert_type {
        AlertType::OverVoltage => "⚠️",
        AlertType::UnderVoltage => "🔻",
        AlertType::OverPower => "⚡",
    }
}

/// The stored message, unless it is blank or only repeats the value
fn detail(alert: &Alert) -> String {
    let message = alert.message.trim();
    if !message.is_empty() && message != alert.value.trim() {
        return message.to_string();
    }

    let value = alert.value.trim();
    match alert.alert_type {
        AlertType::OverVoltage => format!("Voltage exceeds maximum threshold. Current value: {value}"),
        AlertType::UnderVoltage => format!("Voltage is below minimum threshold. Current value: {value}"),
        AlertType::OverPower => format!("Power exceeds maximum threshold. Current value: {value}"),
    }
}

pub fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn alert(alert_type: AlertType, message: &str, value: &str) -> Alert {
        Alert {
            id: 1,
            company_id: 2,
            device_id: Some(3),
            alert_type,
            message: message.to_string(),
            value: value.to_string(),
            created_at: Utc.with_ymd_and_hms(2026, 3, 14, 18, 5, 0).unwrap(),
            delivered: false,
        }
    }

    #[test]
    fn test_full_message_layout() {
        let formatter = AlertMessageFormatter::new(-180).unwrap();
        let text = formatter.format(
            &alert(
                AlertType::OverVoltage,
                "Voltage exceeds maximum threshold (250V). Current value: 254.32V",
                "254.32V",
            ),
            Some("Main panel"),
        );

        assert_eq!(
            text,
            "⚠️ <b>Over-voltage</b>: 254.32V\n📱 Device: Main panel\n\n\
             Voltage exceeds maximum threshold (250V). Current value: 254.32V\n\n🕐 14/03/26 15:05"
        );
    }

    #[test]
    fn test_message_repeating_value_gets_auto_detail() {
        let formatter = AlertMessageFormatter::new(0).unwrap();
        let text = formatter.format(&alert(AlertType::UnderVoltage, "187.50V", "187.50V"), None);

        assert!(text.starts_with("🔻 <b>Under-voltage</b>: 187.50V\n\n"));
        assert!(text.contains("Voltage is below minimum threshold. Current value: 187.50V"));
        assert!(!text.contains("Device:"));
    }

    #[test]
    fn test_blank_message_gets_auto_detail() {
        let formatter = AlertMessageFormatter::new(0).unwrap();
        let text = formatter.format(&alert(AlertType::OverPower, "  ", "5400.13W"), None);

        assert!(text.contains("⚡ <b>Over-power</b>"));
        assert!(text.contains("Power exceeds maximum threshold. Current value: 5400.13W"));
    }

    #[test]
    fn test_device_name_is_escaped() {
        let formatter = AlertMessageFormatter::new(0).unwrap();
        let text = formatter.format(
            &alert(AlertType::OverPower, "x", "1W"),
            Some("Lab <A&B>"),
        );

        assert!(text.contains("Device: Lab &lt;A&amp;B&gt;"));
    }

    #[test]
    fn test_out_of_range_offset_is_rejected() {
        assert!(AlertMessageFormatter::new(24 * 60).is_err());
        assert!(AlertMessageFormatter::new(i32::MAX).is_err());
    }
}
