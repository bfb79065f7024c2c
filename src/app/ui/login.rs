use std::sync::mpsc::{self, Receiver, TryRecvError};

use eframe::egui::{self, Color32, Context, TextEdit, Ui};
use tokio::runtime::Handle;
use tracing::{debug, warn};

use crate::api::{
    ApiError, AuthClient, AuthOutcome, Registration, validate_email, validate_password,
    validate_username,
};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
enum LoginMode {
    #[default]
    SignIn,
    Register,
    RecoverPassword,
    ResendVerification,
}

enum AuthReply {
    SignedIn(String),
    SignInFailed(String),
    Outcome {
        outcome: AuthOutcome,
        success_message: &'static str,
    },
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum Message {
    Info(String),
    Error(String),
}

/// Sign-in screen plus the account helpers reachable from it.
#[derive(Default)]
pub struct LoginForm {
    mode: LoginMode,
    username: String,
    password: String,
    email: String,
    registration: Registration,
    message: Option<Message>,
    pending: Option<Receiver<AuthReply>>,
}

fn sign_in_error(error: &ApiError) -> String {
    match error.status() {
        Some(401) => "Invalid username or password.".to_owned(),
        _ => "An error occurred. Please try again later.".to_owned(),
    }
}

/// First problem with a registration form, if any.
fn registration_problem(registration: &Registration) -> Option<&'static str> {
    if registration.first_name.trim().is_empty()
        || registration.last_name.trim().is_empty()
        || registration.organization.trim().is_empty()
    {
        return Some("Please fill in your name and organization.");
    }
    if !validate_username(&registration.username) {
        return Some(
            "Usernames need at least 6 letters, digits or a single inner dot, including a letter.",
        );
    }
    if !validate_password(&registration.password) {
        return Some("Passwords need at least 8 characters.");
    }
    if !validate_email(&registration.email) {
        return Some("Please enter a valid email address.");
    }
    None
}

impl LoginForm {
    pub fn new(username: String) -> Self {
        Self {
            username,
            ..Self::default()
        }
    }

    /// Draws the form; returns the username once a sign-in succeeded.
    pub fn show(&mut self, ctx: &Context, runtime: &Handle, auth: &AuthClient) -> Option<String> {
        let signed_in = self.poll(ctx);

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.vertical_centered(|ui| {
                ui.add_space(80.0);
                ui.heading("edgescope");
                ui.add_space(12.0);

                ui.horizontal(|ui| {
                    for (mode, label) in [
                        (LoginMode::SignIn, "Sign in"),
                        (LoginMode::Register, "Register"),
                        (LoginMode::RecoverPassword, "Forgot password"),
                        (LoginMode::ResendVerification, "Resend verification"),
                    ] {
                        if ui.selectable_label(self.mode == mode, label).clicked() {
                            self.mode = mode;
                            self.message = None;
                        }
                    }
                });
                ui.add_space(12.0);

                ui.allocate_ui(egui::vec2(360.0, 0.0), |ui| match self.mode {
                    LoginMode::SignIn => self.sign_in_form(ui, runtime, auth),
                    LoginMode::Register => self.register_form(ui, runtime, auth),
                    LoginMode::RecoverPassword | LoginMode::ResendVerification => {
                        self.email_form(ui, runtime, auth);
                    }
                });

                ui.add_space(10.0);
                if self.pending.is_some() {
                    ui.spinner();
                }
                match &self.message {
                    Some(Message::Info(text)) => {
                        ui.colored_label(Color32::from_rgb(0x16, 0xa3, 0x4a), text);
                    }
                    Some(Message::Error(text)) => {
                        ui.colored_label(Color32::from_rgb(0xdc, 0x26, 0x26), text);
                    }
                    None => {}
                }
            });
        });

        signed_in
    }

    fn poll(&mut self, ctx: &Context) -> Option<String> {
        let rx = self.pending.as_ref()?;
        let reply = match rx.try_recv() {
            Ok(reply) => reply,
            Err(TryRecvError::Empty) => {
                ctx.request_repaint_after(std::time::Duration::from_millis(100));
                return None;
            }
            Err(TryRecvError::Disconnected) => {
                self.pending = None;
                self.message = Some(Message::Error(
                    "An error occurred. Please try again later.".to_owned(),
                ));
                return None;
            }
        };
        self.pending = None;

        match reply {
            AuthReply::SignedIn(username) => return Some(username),
            AuthReply::SignInFailed(message) => self.message = Some(Message::Error(message)),
            AuthReply::Outcome {
                outcome,
                success_message,
            } => {
                debug!(
                    status = outcome.status,
                    has_data = outcome.data.is_some(),
                    "account request finished"
                );
                self.message = Some(if outcome.success {
                    Message::Info(success_message.to_owned())
                } else {
                    Message::Error(outcome.details.unwrap_or_default())
                });
            }
        }
        None
    }

    fn submit<F>(&mut self, runtime: &Handle, work: F)
    where
        F: Future<Output = AuthReply> + Send + 'static,
    {
        let (tx, rx) = mpsc::channel();
        runtime.spawn(async move {
            let _ = tx.send(work.await);
        });
        self.message = None;
        self.pending = Some(rx);
    }

    fn sign_in_form(&mut self, ui: &mut Ui, runtime: &Handle, auth: &AuthClient) {
        ui.label("Username");
        ui.add(TextEdit::singleline(&mut self.username).desired_width(f32::INFINITY));
        ui.label("Password");
        let password = ui.add(
            TextEdit::singleline(&mut self.password)
                .password(true)
                .desired_width(f32::INFINITY),
        );
        let submitted =
            password.lost_focus() && ui.input(|input| input.key_pressed(egui::Key::Enter));

        let clicked = ui
            .add_enabled(self.pending.is_none(), egui::Button::new("Sign in"))
            .clicked();
        if !(clicked || submitted) || self.pending.is_some() {
            return;
        }

        if self.username.trim().is_empty() || self.password.is_empty() {
            self.message = Some(Message::Error(
                "Username and password cannot be empty.".to_owned(),
            ));
            return;
        }

        let auth = auth.clone();
        let username = self.username.trim().to_owned();
        let password = std::mem::take(&mut self.password);
        self.submit(runtime, async move {
            match auth.login(&username, &password).await {
                Ok(_) => AuthReply::SignedIn(username),
                Err(error) => {
                    warn!("sign-in failed: {error}");
                    AuthReply::SignInFailed(sign_in_error(&error))
                }
            }
        });
    }

    fn register_form(&mut self, ui: &mut Ui, runtime: &Handle, auth: &AuthClient) {
        let form = &mut self.registration;
        egui::Grid::new("register_form")
            .num_columns(2)
            .spacing([8.0, 6.0])
            .show(ui, |ui| {
                for (label, value, secret) in [
                    ("First name", &mut form.first_name, false),
                    ("Last name", &mut form.last_name, false),
                    ("Organization", &mut form.organization, false),
                    ("Username", &mut form.username, false),
                    ("Password", &mut form.password, true),
                    ("Email", &mut form.email, false),
                ] {
                    ui.label(label);
                    ui.add(TextEdit::singleline(value).password(secret));
                    ui.end_row();
                }
            });

        let clicked = ui
            .add_enabled(self.pending.is_none(), egui::Button::new("Create account"))
            .clicked();
        if !clicked {
            return;
        }

        if let Some(problem) = registration_problem(&self.registration) {
            self.message = Some(Message::Error(problem.to_owned()));
            return;
        }

        let auth = auth.clone();
        let registration = self.registration.clone();
        self.submit(runtime, async move {
            AuthReply::Outcome {
                outcome: auth.register(&registration).await,
                success_message: "Account created. Check your inbox to verify your email.",
            }
        });
    }

    fn email_form(&mut self, ui: &mut Ui, runtime: &Handle, auth: &AuthClient) {
        ui.label("Email");
        ui.add(TextEdit::singleline(&mut self.email).desired_width(f32::INFINITY));

        let recover = self.mode == LoginMode::RecoverPassword;
        let label = if recover {
            "Send recovery email"
        } else {
            "Resend verification email"
        };
        let clicked = ui
            .add_enabled(self.pending.is_none(), egui::Button::new(label))
            .clicked();
        if !clicked {
            return;
        }

        if !validate_email(&self.email) {
            self.message = Some(Message::Error("Please enter a valid email address.".to_owned()));
            return;
        }

        let auth = auth.clone();
        let email = self.email.trim().to_owned();
        self.submit(runtime, async move {
            if recover {
                AuthReply::Outcome {
                    outcome: auth.recover_password(&email).await,
                    success_message:
                        "If the address is registered, a recovery email is on its way.",
                }
            } else {
                AuthReply::Outcome {
                    outcome: auth.resend_verification(&email).await,
                    success_message: "Verification email sent.",
                }
            }
        });
    }
}

/// Password change for the signed-in account, shown as a floating window.
#[derive(Default)]
pub struct PasswordDialog {
    old_password: String,
    new_password: String,
    confirm_password: String,
    message: Option<Message>,
    pending: Option<Receiver<Result<(), String>>>,
}

fn password_change_problem(old: &str, new: &str, confirm: &str) -> Option<&'static str> {
    if old.is_empty() {
        return Some("Please enter your current password.");
    }
    if !validate_password(new) {
        return Some("Passwords need at least 8 characters.");
    }
    if new != confirm {
        return Some("The new passwords do not match.");
    }
    None
}

impl PasswordDialog {
    /// Returns `false` once the window was closed.
    pub fn show(&mut self, ctx: &Context, runtime: &Handle, auth: &AuthClient) -> bool {
        if let Some(rx) = &self.pending {
            match rx.try_recv() {
                Ok(Ok(())) => {
                    self.pending = None;
                    self.old_password.clear();
                    self.new_password.clear();
                    self.confirm_password.clear();
                    self.message = Some(Message::Info("Password changed.".to_owned()));
                }
                Ok(Err(text)) => {
                    self.pending = None;
                    self.message = Some(Message::Error(text));
                }
                Err(TryRecvError::Empty) => {
                    ctx.request_repaint_after(std::time::Duration::from_millis(100));
                }
                Err(TryRecvError::Disconnected) => self.pending = None,
            }
        }

        let mut open = true;
        egui::Window::new("Change password")
            .open(&mut open)
            .collapsible(false)
            .resizable(false)
            .show(ctx, |ui| {
                egui::Grid::new("password_form")
                    .num_columns(2)
                    .spacing([8.0, 6.0])
                    .show(ui, |ui| {
                        for (label, value) in [
                            ("Current password", &mut self.old_password),
                            ("New password", &mut self.new_password),
                            ("Confirm new password", &mut self.confirm_password),
                        ] {
                            ui.label(label);
                            ui.add(TextEdit::singleline(value).password(true));
                            ui.end_row();
                        }
                    });

                let clicked = ui
                    .add_enabled(self.pending.is_none(), egui::Button::new("Update password"))
                    .clicked();
                if clicked {
                    self.submit(runtime, auth);
                }

                if self.pending.is_some() {
                    ui.spinner();
                }
                match &self.message {
                    Some(Message::Info(text)) => {
                        ui.colored_label(Color32::from_rgb(0x16, 0xa3, 0x4a), text);
                    }
                    Some(Message::Error(text)) => {
                        ui.colored_label(Color32::from_rgb(0xdc, 0x26, 0x26), text);
                    }
                    None => {}
                }
            });

        open
    }

    fn submit(&mut self, runtime: &Handle, auth: &AuthClient) {
        if let Some(problem) =
            password_change_problem(&self.old_password, &self.new_password, &self.confirm_password)
        {
            self.message = Some(Message::Error(problem.to_owned()));
            return;
        }

        let (tx, rx) = mpsc::channel();
        let auth = auth.clone();
        let old_password = self.old_password.clone();
        let new_password = self.new_password.clone();
        runtime.spawn(async move {
            let result = auth
                .change_password(&old_password, &new_password)
                .await
                .map_err(|error| {
                    warn!("password change failed: {error}");
                    match error {
                        ApiError::Status { message, .. } if !message.is_empty() => message,
                        _ => "An error occurred. Please try again later.".to_owned(),
                    }
                });
            let _ = tx.send(result);
        });
        self.message = None;
        self.pending = Some(rx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_registration() -> Registration {
        Registration {
            first_name: "Ada".to_owned(),
            last_name: "Lovelace".to_owned(),
            organization: "Analytical".to_owned(),
            username: "ada.love".to_owned(),
            password: "difference".to_owned(),
            email: "ada@example.com".to_owned(),
        }
    }

    #[test]
    fn complete_registration_has_no_problem() {
        assert_eq!(registration_problem(&valid_registration()), None);
    }

    #[test]
    fn registration_checks_each_field() {
        let blank = Registration {
            organization: " ".to_owned(),
            ..valid_registration()
        };
        assert!(registration_problem(&blank).is_some());

        let bad_user = Registration {
            username: ".ada".to_owned(),
            ..valid_registration()
        };
        assert!(registration_problem(&bad_user).is_some_and(|text| text.starts_with("Usernames")));

        let short_password = Registration {
            password: "short".to_owned(),
            ..valid_registration()
        };
        assert!(
            registration_problem(&short_password)
                .is_some_and(|text| text.starts_with("Passwords"))
        );

        let bad_email = Registration {
            email: "ada@example".to_owned(),
            ..valid_registration()
        };
        assert!(registration_problem(&bad_email).is_some_and(|text| text.contains("email")));
    }

    #[test]
    fn password_change_requires_matching_valid_password() {
        assert_eq!(password_change_problem("old", "longenough", "longenough"), None);
        assert!(password_change_problem("", "longenough", "longenough").is_some());
        assert!(password_change_problem("old", "short", "short").is_some());
        assert_eq!(
            password_change_problem("old", "longenough", "longenougH"),
            Some("The new passwords do not match.")
        );
    }

    #[test]
    fn sign_in_errors_distinguish_bad_credentials() {
        let unauthorized = ApiError::Status {
            status: 401,
            message: "Unauthorized".to_owned(),
        };
        assert_eq!(sign_in_error(&unauthorized), "Invalid username or password.");
        assert_eq!(
            sign_in_error(&ApiError::Timeout),
            "An error occurred. Please try again later."
        );
    }
}
