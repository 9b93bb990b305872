use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::marketplace::domain::{Company, Response, Service};

/// Queue payload describing a newly received response. `company` is the
/// recipient: the email of the company that owns the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseNotification {
    pub email: String,
    pub phone: String,
    pub full_name: String,
    pub company: String,
    pub service: String,
    pub response_date: NaiveDate,
}

impl ResponseNotification {
    pub fn from_response(response: &Response, service: &Service, owner: &Company) -> Self {
        Self {
            email: response.email.clone(),
            phone: response.phone.clone(),
            full_name: response.full_name.clone(),
            company: owner.email.clone(),
            service: service.title.clone(),
            response_date: response.response_date,
        }
    }
}

/// Who outbound notifications are sent as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SenderIdentity {
    pub name: String,
    pub email: String,
}

/// Rendered email ready for the delivery API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub recipient: String,
    pub sender_name: String,
    pub sender_email: String,
    pub subject: String,
    pub html_body: String,
}

impl EmailMessage {
    pub fn for_response(notification: &ResponseNotification, sender: &SenderIdentity) -> Self {
        let subject = format!("You have new response for «{}»", notification.service);
        let rows = [
            ("Full name", notification.full_name.as_str()),
            ("Email", notification.email.as_str()),
            ("Phone", notification.phone.as_str()),
        ];

        let mut html_body = format!("<h4>{}</h4><table><tbody>", escape_html(&subject));
        for (label, value) in rows {
            html_body.push_str(&format!(
                "<tr><td>{label}</td><td>{}</td></tr>",
                escape_html(value)
            ));
        }
        html_body.push_str(&format!(
            "<tr><td>Date</td><td>{}</td></tr></tbody></table>",
            notification.response_date.format("%Y-%m-%d")
        ));

        Self {
            recipient: notification.company.clone(),
            sender_name: sender.name.clone(),
            sender_email: sender.email.clone(),
            subject,
            html_body,
        }
    }
}

fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
