//! HTML bodies for account notification emails.

pub const VERIFICATION_CODE_TTL_MINUTES: u32 = 15;
pub const PASSWORD_RESET_CODE_TTL_MINUTES: u32 = 15;
pub const TWO_FACTOR_CODE_TTL_MINUTES: u32 = 10;

const FOOTER: &str = "voltwatch electrical monitoring";

/// Subject and body pair ready to enqueue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedEmail {
    pub subject: String,
    pub html: String,
}

pub fn render_verification_email(code: &str) -> RenderedEmail {
    RenderedEmail {
        subject: "Your verification code".to_string(),
        html: format!(
            r#"<div style="font-family:sans-serif;font-size:14px;color:#222">
  <p>Your verification code is:</p>
  <h2 style="margin:8px 0">{code}</h2>
  <p>This code expires in {VERIFICATION_CODE_TTL_MINUTES} minutes.</p>
</div>"#
        ),
    }
}

pub fn render_password_reset_email(code: &str) -> RenderedEmail {
    RenderedEmail {
        subject: "Password reset code".to_string(),
        html: card_layout(
            "#1976d2",
            "Reset your password",
            "You asked to reset your password. Use the following code to finish:",
            code,
            PASSWORD_RESET_CODE_TTL_MINUTES,
            "If you did not request this change you can ignore this email.",
        ),
    }
}

pub fn render_two_factor_email(code: &str) -> RenderedEmail {
    RenderedEmail {
        subject: "Your sign-in code".to_string(),
        html: card_layout(
            "#10b981",
            "Sign-in verification",
            "A sign-in to your account was started. Enter this code to complete it:",
            code,
            TWO_FACTOR_CODE_TTL_MINUTES,
            "If this was not you, change your password immediately.",
        ),
    }
}

fn card_layout(
    accent: &str,
    title: &str,
    intro: &str,
    code: &str,
    ttl_minutes: u32,
    warning: &str,
) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
  <meta charset="utf-8">
  <meta name="viewport" content="width=device-width, initial-scale=1.0">
</head>
<body style="margin:0;padding:0;font-family:Arial,sans-serif;background-color:#f5f5f5">
  <table width="100%" cellpadding="0" cellspacing="0" style="background-color:#f5f5f5;padding:20px">
    <tr><td align="center">
      <table width="600" cellpadding="0" cellspacing="0" style="background-color:#ffffff;border-radius:8px">
        <tr><td style="padding:40px 30px;text-align:center;background-color:{accent};border-radius:8px 8px 0 0">
          <h1 style="margin:0;color:#ffffff;font-size:24px">{title}</h1>
        </td></tr>
        <tr><td style="padding:40px 30px">
          <p style="margin:0 0 20px 0;font-size:16px;color:#333333">{intro}</p>
          <div style="border:2px dashed {accent};border-radius:8px;padding:20px;text-align:center;margin:30px 0">
            <h2 style="margin:0;font-size:32px;letter-spacing:4px;color:{accent};font-family:'Courier New',monospace">{code}</h2>
          </div>
          <p style="margin:20px 0 0 0;font-size:14px;color:#666666">
            This code expires in <strong>{ttl_minutes} minutes</strong>. {warning}
          </p>
        </td></tr>
        <tr><td style="padding:20px 30px;background-color:#f9f9f9;text-align:center;border-top:1px solid #e0e0e0">
          <p style="margin:0;font-size:12px;color:#999999">{FOOTER}</p>
        </td></tr>
      </table>
    </td></tr>
  </table>
</body>
</html>"#
    )
}
