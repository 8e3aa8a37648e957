use cce_compress::Message;

/// Prose message content of exactly `len` characters.
pub fn prose_of_len(opening: &str, len: usize) -> String {
    let mut content = String::from(opening);
    while content.len() < len {
        content.push_str(" More detail follows in the appendix of the report.");
    }
    content.truncate(len);
    content
}

/// A long compressible paragraph, unique per tag.
pub fn long_prose(tag: &str) -> String {
    format!(
        "{tag} walked through the cache migration plan for the billing service. \
         Every canary check reported PASS before traffic shifted to the new \
         nodes, so the change window closed early without manual intervention."
    )
}

/// `n` long-prose assistant turns.
pub fn assistant_run(n: usize) -> Vec<Message> {
    (0..n)
        .map(|i| Message::assistant(format!("m{i}"), long_prose(&format!("Update {i}"))))
        .collect()
}

/// Alternating user/assistant turns of long prose.
pub fn conversation(n: usize) -> Vec<Message> {
    (0..n)
        .map(|i| {
            let role = if i % 2 == 0 { "user" } else { "assistant" };
            Message::new(format!("m{i}"), role, long_prose(&format!("Turn {i}")))
        })
        .collect()
}
