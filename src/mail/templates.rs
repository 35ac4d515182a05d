//! Bodies of the two messages the service sends.

use std::time::Duration;

pub const VERIFICATION_SUBJECT: &str = "Your verification code";
pub const REGISTRATION_SUBJECT: &str = "Registration complete";

const STYLE: &str = "body { font-family: Arial, sans-serif; background-color: #f4f4f4; margin: 0; padding: 0; }
        .container { max-width: 600px; margin: 0 auto; background-color: #ffffff; padding: 20px; border-radius: 10px; }
        h2 { color: #4caf50; text-align: center; }
        .code { color: #d32f2f; font-size: 28px; font-weight: bold; letter-spacing: 4px; text-align: center; }
        .footer { color: #333333; margin-top: 30px; text-align: center; font-size: 12px; }";

fn page(title: &str, content: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{title}</title>
    <style>
        {STYLE}
    </style>
</head>
<body>
    <div class="container">
        <h2>{title}</h2>
{content}
    </div>
    <div class="footer">
        <p>If you did not request this message you can ignore it.</p>
    </div>
</body>
</html>
"#
    )
}

/// Verification code mail, `validity` is rounded down to whole minutes.
#[must_use]
pub fn verification_code(code: u32, validity: Duration) -> String {
    let minutes = validity.as_secs() / 60;
    page(
        VERIFICATION_SUBJECT,
        &format!(
            r#"        <p>Hello,</p>
        <p>To finish creating your account enter the following code:</p>
        <p class="code">{code}</p>
        <p>The code is valid for {minutes} minutes. Do not share it with anyone.</p>"#
        ),
    )
}

#[must_use]
pub fn registration_notice(email: &str) -> String {
    page(
        REGISTRATION_SUBJECT,
        &format!(
            r"        <p>Hello,</p>
        <p>The account for <strong>{}</strong> has been created. You can sign in now.</p>",
            escape(email)
        ),
    )
}

fn escape(text: &str) -> String {
    text.chars()
        .fold(String::with_capacity(text.len()), |mut out, ch| {
            match ch {
                '&' => out.push_str("&amp;"),
                '<' => out.push_str("&lt;"),
                '>' => out.push_str("&gt;"),
                '"' => out.push_str("&quot;"),
                '\'' => out.push_str("&#39;"),
                _ => out.push(ch),
            }
            out
        })
}
