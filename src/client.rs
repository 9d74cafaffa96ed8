//! Terminal client session.
//!
//! Translates typed input (slash commands or plain chat text) into protocol
//! lines and renders server lines as plain text. The session multiplexes the
//! terminal and the socket with `tokio::select!`.

use crate::protocol::{truncate_to_capacity, ProfileField, NICK_MAX};
use crate::runtime::LineBuffer;
use std::io;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Line bound for data received from the server.
const MAX_LINE: usize = 4096;

const READ_CHUNK: usize = 4096;

const HELP: &str = "Known: /nick, /profile get, /profile set displayname|bio|pronouns, /quit";

/// What to do with one line of user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    /// Send this protocol line to the server.
    Send(String),
    /// Print a usage hint.
    Usage(&'static str),
    /// Unrecognized slash command.
    Unknown(String),
    /// Leave the session.
    Quit,
    /// Blank line.
    Empty,
}

/// Translate one line of user input.
pub fn translate_input(input: &str) -> Input {
    if input.is_empty() {
        return Input::Empty;
    }
    if !input.starts_with('/') {
        return Input::Send(format!("MSG :{input}"));
    }

    if input == "/quit" {
        return Input::Quit;
    }
    if let Some(name) = input.strip_prefix("/nick ") {
        return required(name, "Usage: /nick NAME", |name| format!("NICK {name}"));
    }
    if let Some(nick) = input.strip_prefix("/profile get ") {
        return required(nick, "Usage: /profile get NICK", |nick| {
            format!("PROFILE GET {nick}")
        });
    }

    for (field, usage) in [
        (ProfileField::DisplayName, "Usage: /profile set displayname TEXT"),
        (ProfileField::Bio, "Usage: /profile set bio TEXT"),
        (ProfileField::Pronouns, "Usage: /profile set pronouns TEXT"),
    ] {
        let prefix = format!("/profile set {} ", field.name().to_ascii_lowercase());
        if let Some(value) = input.strip_prefix(prefix.as_str()) {
            return required(value, usage, |value| {
                format!("PROFILE SET {} :{value}", field.name())
            });
        }
    }

    Input::Unknown(input.to_string())
}

fn required(arg: &str, usage: &'static str, line: impl FnOnce(&str) -> String) -> Input {
    if arg.is_empty() {
        Input::Usage(usage)
    } else {
        Input::Send(line(arg))
    }
}

/// Profile being assembled from `PROFILE DATA` lines.
#[derive(Debug, Default)]
struct ProfileView {
    nick: String,
    display_name: String,
    pronouns: String,
    bio: String,
}

impl ProfileView {
    fn render(&self) -> String {
        let mut out = format!("----- Profile: {} -----\n", self.nick);
        for (label, value) in [
            ("Display name", &self.display_name),
            ("Pronouns", &self.pronouns),
            ("Bio", &self.bio),
        ] {
            if !value.is_empty() {
                out.push_str(&format!("{label}: {value}\n"));
            }
        }
        out.push_str("---------------------------");
        out
    }
}

/// Client-side state: our own nickname and any profile being received.
#[derive(Debug, Default)]
pub struct Session {
    nick: String,
    profile: Option<ProfileView>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Nickname most recently requested with `/nick`.
    pub fn nick(&self) -> &str {
        &self.nick
    }

    /// Translate input, remembering the nickname we asked for.
    pub fn handle_input(&mut self, input: &str) -> Input {
        let input = translate_input(input);
        if let Input::Send(ref line) = input {
            if let Some(name) = line.strip_prefix("NICK ") {
                self.nick = truncate_to_capacity(name, NICK_MAX).to_string();
            }
        }
        input
    }

    /// Render one server line. Returns `None` while a profile is being collected.
    pub fn render(&mut self, line: &str) -> Option<String> {
        if let Some(text) = line.strip_prefix("SYS :") {
            return Some(format!("[system] {text}"));
        }

        if let Some(rest) = line.strip_prefix("MSG ") {
            let rest = rest.strip_prefix('@').unwrap_or(rest);
            let end = rest.find([' ', ':']).unwrap_or(rest.len());
            let nick = &rest[..end];
            let body = line.find(':').map(|pos| &line[pos + 1..]).unwrap_or("");
            let marker = if !self.nick.is_empty() && self.nick == nick {
                " (you)"
            } else {
                ""
            };
            return Some(format!("{nick}{marker}: {body}"));
        }

        if let Some(rest) = line.strip_prefix("PROFILE DATA ") {
            self.collect_profile(rest);
            return None;
        }

        if let Some(rest) = line.strip_prefix("PROFILE END ") {
            let nick = rest.trim_start_matches(' ');
            let nick = nick.split([' ', '\r', '\n']).next().unwrap_or("");
            return match self.profile.take() {
                Some(view) if view.nick == nick => Some(view.render()),
                Some(view) => {
                    self.profile = Some(view);
                    None
                }
                // Nothing collected for this nick.
                None => None,
            };
        }

        if let Some(err) = line.strip_prefix("PROFILE ERR ") {
            return Some(format!("[profile error] {err}"));
        }

        Some(format!("[raw] {line}"))
    }

    fn collect_profile(&mut self, rest: &str) {
        let rest = rest.trim_start_matches(' ');
        let nick_end = rest.find(' ').unwrap_or(rest.len());
        let (nick, rest) = rest.split_at(nick_end);
        let rest = rest.trim_start_matches(' ');
        let field_end = rest.find([' ', ':']).unwrap_or(rest.len());
        let (field, rest) = rest.split_at(field_end);

        let Some(pos) = rest.find(':') else {
            return;
        };
        let value = rest[pos + 1..].trim_start_matches(' ');

        let view = match self.profile.take() {
            Some(view) if view.nick == nick => self.profile.insert(view),
            _ => self.profile.insert(ProfileView {
                nick: nick.to_string(),
                ..Default::default()
            }),
        };

        match ProfileField::from_name(field) {
            Some(ProfileField::DisplayName) => view.display_name = value.to_string(),
            Some(ProfileField::Pronouns) => view.pronouns = value.to_string(),
            Some(ProfileField::Bio) => view.bio = value.to_string(),
            None => {}
        }
    }
}

/// Run a session until the user quits, input ends, or the server disconnects.
pub async fn run<S, I, O>(stream: S, input: I, mut output: O) -> io::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
    I: AsyncBufRead + Unpin,
    O: AsyncWrite + Unpin,
{
    let (mut reader, mut writer) = tokio::io::split(stream);
    let mut input = input.lines();
    let mut session = Session::new();
    let mut framer = LineBuffer::new(MAX_LINE);
    let mut buf = vec![0u8; READ_CHUNK];

    loop {
        tokio::select! {
            typed = input.next_line() => {
                let Some(typed) = typed? else {
                    write_out(&mut output, "Exiting.").await?;
                    return Ok(());
                };

                match session.handle_input(&typed) {
                    Input::Send(line) => {
                        writer.write_all(line.as_bytes()).await?;
                        writer.write_all(b"\r\n").await?;
                        writer.flush().await?;
                    }
                    Input::Usage(usage) => write_out(&mut output, usage).await?,
                    Input::Unknown(cmd) => {
                        write_out(&mut output, &format!("Unknown command: {cmd}")).await?;
                        write_out(&mut output, HELP).await?;
                    }
                    Input::Quit => {
                        write_out(&mut output, "Bye!").await?;
                        return Ok(());
                    }
                    Input::Empty => {}
                }
            }

            n = reader.read(&mut buf) => {
                let n = n?;
                if n == 0 {
                    write_out(&mut output, "Disconnected from server.").await?;
                    return Ok(());
                }

                let framed = framer.feed(&buf[..n]);
                while let Some(line) = framer.next_line() {
                    let line = String::from_utf8_lossy(&line);
                    if let Some(text) = session.render(&line) {
                        write_out(&mut output, &text).await?;
                    }
                }
                framed.map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
            }
        }
    }
}

async fn write_out<O: AsyncWrite + Unpin>(output: &mut O, text: &str) -> io::Result<()> {
    output.write_all(text.as_bytes()).await?;
    output.write_all(b"\n").await?;
    output.flush().await
}
