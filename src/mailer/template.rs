use chrono::{DateTime, Utc};

use super::ReminderEmail;

const URGENT_COLOR: &str = "#e53e3e";
const UPCOMING_BORDER: &str = "#ecc94b";
const UPCOMING_TEXT: &str = "#d69e2e";

fn is_urgent(email: &ReminderEmail) -> bool {
    email.hours_remaining <= 1.0
}

pub fn format_deadline(deadline: DateTime<Utc>) -> String {
    deadline.format("%A, %B %-d, %Y at %I:%M %p UTC").to_string()
}

fn remaining_phrase(email: &ReminderEmail) -> String {
    if is_urgent(email) {
        "less than 1 hour".to_string()
    } else {
        format!("{} hours", email.hours_remaining.round() as i64)
    }
}

pub fn subject(email: &ReminderEmail) -> String {
    let urgency = if is_urgent(email) { "URGENT" } else { "Upcoming" };
    format!(
        "[{}] \"{}\" is due in {}",
        urgency,
        email.assignment_title,
        remaining_phrase(email)
    )
}

pub fn html_body(email: &ReminderEmail) -> String {
    let (border, accent) = if is_urgent(email) {
        (URGENT_COLOR, URGENT_COLOR)
    } else {
        (UPCOMING_BORDER, UPCOMING_TEXT)
    };
    let remaining = if is_urgent(email) {
        "Less than 1 hour remaining!".to_string()
    } else {
        format!("About {} remaining", remaining_phrase(email))
    };

    format!(
        r#"<div style="font-family: 'Segoe UI', Tahoma, Geneva, Verdana, sans-serif; max-width: 600px; margin: 0 auto; padding: 20px;">
  <div style="background: linear-gradient(135deg, #667eea 0%, #764ba2 100%); padding: 30px; border-radius: 12px 12px 0 0;">
    <h1 style="color: white; margin: 0; font-size: 24px;">Trackademic Reminder</h1>
  </div>
  <div style="background: #ffffff; padding: 30px; border: 1px solid #e2e8f0; border-top: none; border-radius: 0 0 12px 12px;">
    <p style="color: #4a5568; font-size: 16px; margin-top: 0;">Hi <strong>{name}</strong>,</p>
    <p style="color: #4a5568; font-size: 16px;">This is a reminder that your assignment is due soon:</p>
    <div style="background: #f7fafc; border-left: 4px solid {border}; padding: 16px; margin: 20px 0; border-radius: 0 8px 8px 0;">
      <h2 style="color: #2d3748; margin: 0 0 8px 0; font-size: 18px;">{title}</h2>
      <p style="color: #718096; margin: 4px 0;"><strong>Course:</strong> {course}</p>
      <p style="color: #718096; margin: 4px 0;"><strong>Deadline:</strong> {deadline}</p>
      <p style="color: {accent}; margin: 4px 0; font-weight: bold;">{remaining}</p>
    </div>
    <p style="color: #718096; font-size: 14px; margin-top: 24px;">The Trackademic Team</p>
  </div>
</div>"#,
        name = escape_html(&email.student_name),
        border = border,
        title = escape_html(&email.assignment_title),
        course = escape_html(&email.course),
        deadline = format_deadline(email.deadline),
        accent = accent,
        remaining = remaining,
    )
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}
