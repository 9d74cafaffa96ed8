//! Command execution.
//!
//! Applies one parsed line to the issuing client and the registry. All
//! output is queued on the recipients' outbound buffers before returning;
//! the event loop writes it out afterwards.

use crate::protocol::{parse, truncate_to_capacity, Command, ProfileField, Response, NICK_MAX};
use crate::runtime::connection::ClientRegistry;
use tracing::trace;

/// Parse and execute a single complete line from client `id`.
pub fn process_line<S>(registry: &mut ClientRegistry<S>, id: usize, line: &[u8]) {
    let line = String::from_utf8_lossy(line);
    let command = parse(&line);
    trace!(conn_id = id, ?command, "Processing command");
    execute(registry, id, command);
}

/// Execute a parsed command on behalf of client `id`.
pub fn execute<S>(registry: &mut ClientRegistry<S>, id: usize, command: Command<'_>) {
    let Some(client) = registry.get_mut(id) else {
        return;
    };

    match command {
        Command::Nick(name) => {
            client.nick = truncate_to_capacity(name, NICK_MAX).to_string();
            let shown = if client.nick.is_empty() {
                "anonymous"
            } else {
                client.nick.as_str()
            };
            let notice = Response::joined(shown);

            registry.broadcast(id, &notice);
            registry.send(id, Response::nickname_set());
        }

        Command::Msg(text) => {
            let from = if client.nick.is_empty() {
                "anon"
            } else {
                client.nick.as_str()
            };
            let line = Response::msg(from, text);

            registry.broadcast(id, &line);
            registry.send(id, &line);
        }

        Command::Ping => client.queue_line(Response::pong()),

        Command::ProfileSet { field, value } => match ProfileField::from_name(field) {
            None => client.queue_line(Response::profile_field()),
            Some(field) if value.len() >= field.capacity() => {
                client.queue_line(Response::profile_too_long());
            }
            Some(field) => {
                client.profile.set(field, value);
                client.queue_line(&Response::profile_ok(field));
            }
        },

        Command::ProfileGet(nick) => {
            // Stored nicknames are truncated, so look up the same way.
            let nick = truncate_to_capacity(nick, NICK_MAX);
            let lines = profile_lines(registry, nick);
            for line in &lines {
                registry.send(id, line);
            }
        }

        Command::ProfileSyntax => client.queue_line(Response::profile_syntax()),

        Command::Unknown => client.queue_line(Response::unknown_command()),
    }
}

/// Build the `PROFILE GET` reply for `nick`.
fn profile_lines<S>(registry: &ClientRegistry<S>, nick: &str) -> Vec<String> {
    let Some(target) = registry.find_by_nick(nick).and_then(|t| registry.get(t)) else {
        return vec![Response::profile_not_found(nick)];
    };

    let mut lines: Vec<String> = ProfileField::REPORT_ORDER
        .into_iter()
        .filter_map(|field| {
            let value = target.profile.get(field);
            (!value.is_empty()).then(|| Response::profile_data(&target.nick, field, value))
        })
        .collect();
    lines.push(Response::profile_end(&target.nick));
    lines
}
