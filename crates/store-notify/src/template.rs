//! Email Templates
//!
//! Each template renders to an [`Email`] with an HTML body and a plain-text
//! fallback. All interpolated values are HTML-escaped.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use store_core::{Booking, BookingStatus, Catalog, Order};

/// A rendered message ready for a mailer
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Email {
    pub to: String,
    pub subject: String,
    pub html: String,
    pub text: String,
    /// Template that produced it, for logs and dead letters
    pub template: TemplateKey,
}

/// Template identifiers
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateKey {
    OrderConfirmation,
    BookingRequested,
    BookingAdminAlert,
    BookingStatusChanged,
    InquiryAcknowledgement,
    InquiryAdminCopy,
}

impl TemplateKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            TemplateKey::OrderConfirmation => "order_confirmation",
            TemplateKey::BookingRequested => "booking_requested",
            TemplateKey::BookingAdminAlert => "booking_admin_alert",
            TemplateKey::BookingStatusChanged => "booking_status_changed",
            TemplateKey::InquiryAcknowledgement => "inquiry_acknowledgement",
            TemplateKey::InquiryAdminCopy => "inquiry_admin_copy",
        }
    }
}

/// A link to one purchased download
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadLink {
    pub product_name: String,
    pub url: String,
}

/// A contact-form inquiry
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Inquiry {
    pub name: String,
    pub email: String,
    pub message: String,
}

/// Minimal HTML escaping for interpolated user text
pub fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
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

fn money(amount: Decimal) -> String {
    format!("${:.2}", amount)
}

fn layout(title: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<body style="font-family: Arial, sans-serif; color: #1f2937; max-width: 600px; margin: 0 auto;">
  <div style="background: #111827; color: #ffffff; padding: 20px; text-align: center;">
    <h1 style="margin: 0; font-size: 22px;">{}</h1>
  </div>
  <div style="padding: 24px;">
{}
  </div>
  <div style="padding: 16px; font-size: 12px; color: #6b7280; text-align: center;">
    Ventaro AI Digital Store
  </div>
</body>
</html>"#,
        escape(title),
        body
    )
}

/// Order confirmation with download links
pub fn order_confirmation(order: &Order, catalog: &Catalog, downloads: &[DownloadLink]) -> Email {
    let lines: Vec<(String, u32, Decimal)> = order
        .items
        .iter()
        .map(|item| {
            let name = catalog
                .get(&item.product_id)
                .map(|p| p.name.clone())
                .unwrap_or_else(|| item.product_id.to_string());
            (name, item.quantity, item.subtotal())
        })
        .collect();

    let rows: String = lines
        .iter()
        .map(|(name, qty, subtotal)| {
            format!(
                "      <tr><td>{}</td><td>{}</td><td style=\"text-align: right;\">{}</td></tr>\n",
                escape(name),
                qty,
                money(*subtotal)
            )
        })
        .collect();

    let links: String = downloads
        .iter()
        .map(|d| {
            format!(
                "      <li><a href=\"{}\">{}</a></li>\n",
                escape(&d.url),
                escape(&d.product_name)
            )
        })
        .collect();

    let mut body = format!(
        "    <p>Thank you for your purchase! Order <strong>{}</strong> is confirmed.</p>\n    <table style=\"width: 100%;\">\n{}      <tr><td colspan=\"2\"><strong>Total</strong></td><td style=\"text-align: right;\"><strong>{}</strong></td></tr>\n    </table>\n",
        escape(order.id.as_str()),
        rows,
        money(order.total)
    );
    if !downloads.is_empty() {
        body.push_str(&format!("    <h2>Your downloads</h2>\n    <ul>\n{}    </ul>\n", links));
    }

    let mut text = format!("Thank you for your purchase! Order {} is confirmed.\n\n", order.id);
    for (name, qty, subtotal) in &lines {
        text.push_str(&format!("- {} x{}: {}\n", name, qty, money(*subtotal)));
    }
    text.push_str(&format!("Total: {}\n", money(order.total)));
    if !downloads.is_empty() {
        text.push_str("\nYour downloads:\n");
        for d in downloads {
            text.push_str(&format!("- {}: {}\n", d.product_name, d.url));
        }
    }

    Email {
        to: order.owner.email().to_string(),
        subject: format!("Your Ventaro order {} is confirmed", order.id),
        html: layout("Order confirmed", &body),
        text,
        template: TemplateKey::OrderConfirmation,
    }
}

fn booking_details(booking: &Booking) -> (String, String) {
    let mut html = format!(
        "    <p><strong>Date:</strong> {}<br><strong>Time:</strong> {} ({})<br><strong>Status:</strong> {}</p>\n",
        booking.date,
        booking.time.format("%H:%M"),
        escape(&booking.timezone),
        booking.status.as_str()
    );
    let mut text = format!(
        "Date: {}\nTime: {} ({})\nStatus: {}\n",
        booking.date,
        booking.time.format("%H:%M"),
        booking.timezone,
        booking.status.as_str()
    );

    if let Some(link) = &booking.meeting_link {
        html.push_str(&format!(
            "    <p><strong>Meeting link:</strong> <a href=\"{0}\">{0}</a></p>\n",
            escape(link)
        ));
        text.push_str(&format!("Meeting link: {}\n", link));
    }
    if let Some(notes) = &booking.admin_notes {
        html.push_str(&format!("    <p><strong>Notes:</strong> {}</p>\n", escape(notes)));
        text.push_str(&format!("Notes: {}\n", notes));
    }

    (html, text)
}

/// Acknowledgement to the requester that a booking was received
pub fn booking_requested(booking: &Booking) -> Email {
    let (details, text) = booking_details(booking);
    Email {
        to: booking.requester.email().to_string(),
        subject: "We received your coaching session request".into(),
        html: layout(
            "Booking request received",
            &format!(
                "    <p>Thanks for requesting a coaching session. We'll confirm it shortly.</p>\n{}",
                details
            ),
        ),
        text: format!(
            "Thanks for requesting a coaching session. We'll confirm it shortly.\n\n{}",
            text
        ),
        template: TemplateKey::BookingRequested,
    }
}

/// Alert to the administrator about a new booking
pub fn booking_admin_alert(booking: &Booking, admin_email: &str) -> Email {
    let (details, text) = booking_details(booking);
    let notes = booking.notes.as_deref().unwrap_or("(none)");
    Email {
        to: admin_email.to_string(),
        subject: format!("New coaching booking: {}", booking.slot_label()),
        html: layout(
            "New coaching booking",
            &format!(
                "    <p><strong>From:</strong> {}</p>\n{}    <p><strong>Message:</strong> {}</p>\n",
                escape(booking.requester.email()),
                details,
                escape(notes)
            ),
        ),
        text: format!(
            "From: {}\n{}Message: {}\nBooking id: {}\n",
            booking.requester.email(),
            text,
            notes,
            booking.id
        ),
        template: TemplateKey::BookingAdminAlert,
    }
}

/// Status change notice to the requester
pub fn booking_status_changed(booking: &Booking) -> Email {
    let (details, text) = booking_details(booking);
    let headline = match booking.status {
        BookingStatus::Confirmed => "Your coaching session is confirmed",
        BookingStatus::Cancelled => "Your coaching session was cancelled",
        BookingStatus::Completed => "Thanks for attending your coaching session",
        BookingStatus::PendingConfirmation => "Your coaching session is pending",
    };
    Email {
        to: booking.requester.email().to_string(),
        subject: headline.to_string(),
        html: layout(headline, &details),
        text: format!("{}\n\n{}", headline, text),
        template: TemplateKey::BookingStatusChanged,
    }
}

/// Acknowledgement to whoever sent an inquiry
pub fn inquiry_acknowledgement(inquiry: &Inquiry) -> Email {
    Email {
        to: inquiry.email.clone(),
        subject: "We received your message".into(),
        html: layout(
            "Thanks for reaching out",
            &format!(
                "    <p>Hi {},</p>\n    <p>We received your message and will reply within two business days.</p>\n    <blockquote>{}</blockquote>\n",
                escape(&inquiry.name),
                escape(&inquiry.message)
            ),
        ),
        text: format!(
            "Hi {},\n\nWe received your message and will reply within two business days.\n\n> {}\n",
            inquiry.name, inquiry.message
        ),
        template: TemplateKey::InquiryAcknowledgement,
    }
}

/// Copy of an inquiry for the administrator
pub fn inquiry_admin_copy(inquiry: &Inquiry, admin_email: &str) -> Email {
    Email {
        to: admin_email.to_string(),
        subject: format!("New inquiry from {}", inquiry.name),
        html: layout(
            "New inquiry",
            &format!(
                "    <p><strong>{}</strong> &lt;{}&gt; wrote:</p>\n    <blockquote>{}</blockquote>\n",
                escape(&inquiry.name),
                escape(&inquiry.email),
                escape(&inquiry.message)
            ),
        ),
        text: format!("{} <{}> wrote:\n\n{}\n", inquiry.name, inquiry.email, inquiry.message),
        template: TemplateKey::InquiryAdminCopy,
    }
}
