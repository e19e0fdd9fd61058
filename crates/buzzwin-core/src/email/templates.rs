//! Email bodies for the scheduled jobs and invitations.

use indoc::formatdoc;

use super::{EmailMessage, InvitationRequest};
use crate::ritual::{ImpactMoment, RitualDefinition};
use crate::streaks::{CompletionTrend, StreakStats};

/// Escape text for inclusion in HTML element content or attributes.
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn link(app_url: &str, path: &str) -> String {
    format!("{}/{}", app_url.trim_end_matches('/'), path.trim_start_matches('/'))
}

fn greeting(name: Option<&str>) -> String {
    match name {
        Some(n) if !n.trim().is_empty() => format!("Hi {},", n.trim()),
        _ => "Hi there,".to_string(),
    }
}

/// Daily ritual nudge. `part_of_day` is "morning" or "evening".
pub fn ritual_reminder(
    to: &str,
    name: Option<&str>,
    ritual: &RitualDefinition,
    part_of_day: &str,
    app_url: &str,
) -> EmailMessage {
    let url = link(app_url, "rituals");
    let hello = greeting(name);
    let duration = if ritual.duration.is_empty() {
        String::new()
    } else {
        format!(" ({})", ritual.duration)
    };

    let text = formatdoc! {"
        {hello}

        Your {part_of_day} ritual: {title}{duration}
        {description}

        Mark it done: {url}
        ",
        title = ritual.title,
        description = ritual.description,
    };
    let html = formatdoc! {r#"
        <p>{hello}</p>
        <p>Your {part_of_day} ritual: <strong>{title}</strong>{duration}</p>
        <p>{description}</p>
        <p><a href="{url}">Mark it done</a></p>
        "#,
        hello = escape_html(&hello),
        title = escape_html(&ritual.title),
        duration = escape_html(&duration),
        description = escape_html(&ritual.description),
        url = escape_html(&url),
    };

    EmailMessage {
        to: to.to_string(),
        subject: format!("Your {part_of_day} ritual: {}", ritual.title),
        html,
        text,
    }
}

fn trend_line(trend: CompletionTrend) -> &'static str {
    match trend {
        CompletionTrend::Increasing => "You're doing more than last week. Keep it up!",
        CompletionTrend::Decreasing => "A quieter week. Small steps still count.",
        CompletionTrend::Stable => "Nice and steady.",
    }
}

/// Weekly progress recap.
pub fn weekly_summary(to: &str, name: Option<&str>, stats: &StreakStats, app_url: &str) -> EmailMessage {
    let url = link(app_url, "rituals");
    let hello = greeting(name);
    let best_day = stats
        .best_day
        .map(|d| format!("{d:?}"))
        .unwrap_or_else(|| "n/a".to_string());
    let trend = trend_line(stats.trend);

    let text = formatdoc! {"
        {hello}

        Your week on Buzzwin:
        - Completed this week: {week}
        - Current streak: {current} days
        - Longest streak: {longest} days
        - Best day: {best_day}

        {trend}

        See your rituals: {url}
        ",
        week = stats.completed_this_week,
        current = stats.current_streak,
        longest = stats.longest_streak,
    };
    let html = formatdoc! {r#"
        <p>{hello}</p>
        <p>Your week on Buzzwin:</p>
        <ul>
          <li>Completed this week: {week}</li>
          <li>Current streak: {current} days</li>
          <li>Longest streak: {longest} days</li>
          <li>Best day: {best_day}</li>
        </ul>
        <p>{trend}</p>
        <p><a href="{url}">See your rituals</a></p>
        "#,
        hello = escape_html(&hello),
        week = stats.completed_this_week,
        current = stats.current_streak,
        longest = stats.longest_streak,
        trend = escape_html(trend),
        url = escape_html(&url),
    };

    EmailMessage {
        to: to.to_string(),
        subject: format!("Your week: {} rituals completed", stats.completed_this_week),
        html,
        text,
    }
}

/// Tell a moment's author that someone joined it.
pub fn joined_action(
    to: &str,
    owner_name: Option<&str>,
    joiner_name: &str,
    moment: &ImpactMoment,
    app_url: &str,
) -> EmailMessage {
    let url = link(app_url, &format!("moments/{}", moment.id));
    let hello = greeting(owner_name);

    let text = formatdoc! {"
        {hello}

        {joiner_name} joined your action: \"{action}\"

        See it here: {url}
        ",
        action = moment.text,
    };
    let html = formatdoc! {r#"
        <p>{hello}</p>
        <p><strong>{joiner}</strong> joined your action: &ldquo;{action}&rdquo;</p>
        <p><a href="{url}">See it here</a></p>
        "#,
        hello = escape_html(&hello),
        joiner = escape_html(joiner_name),
        action = escape_html(&moment.text),
        url = escape_html(&url),
    };

    EmailMessage {
        to: to.to_string(),
        subject: format!("{joiner_name} joined your action"),
        html,
        text,
    }
}

/// Invitation to join Buzzwin, optionally to a specific ritual.
pub fn invitation(
    to: &str,
    inviter_name: &str,
    ritual: Option<&RitualDefinition>,
    app_url: &str,
) -> InvitationRequest {
    let (subject, line, url) = match ritual {
        Some(r) => (
            format!("{inviter_name} invited you to \"{}\"", r.title),
            format!("{inviter_name} would like you to join the ritual \"{}\".", r.title),
            link(app_url, &format!("rituals/{}", r.id)),
        ),
        None => (
            format!("{inviter_name} invited you to Buzzwin"),
            format!("{inviter_name} would like you to join them on Buzzwin."),
            app_url.to_string(),
        ),
    };

    let text = formatdoc! {"
        Hi,

        {line}

        Join here: {url}
        "};
    let html = formatdoc! {r#"
        <p>Hi,</p>
        <p>{line}</p>
        <p><a href="{url}">Join here</a></p>
        "#,
        line = escape_html(&line),
        url = escape_html(&url),
    };

    InvitationRequest {
        to: to.to_string(),
        subject,
        html,
        text: Some(text),
    }
}
