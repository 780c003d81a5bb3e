//! Prompt construction for the rephraser.
//!
//! Three registers: a confident one-sentence opener for query intent, a
//! specific-but-casual line for tool calls (mentioning human-meaningful
//! arguments), and a terse thinking-out-loud update for progress batches.

use super::RephraseRequest;
use std::fmt::Write;

/// Argument keys most likely to mean something to a listener, tried first
const PRIORITY_KEYS: &[&str] = &[
    "name", "person", "salesperson", "store", "product", "customer", "employee", "user", "id",
    "date", "period", "year",
];

/// Generic plumbing keys not worth saying out loud
const SKIP_KEYS: &[&str] = &["subject", "select", "format", "limit"];

const MAX_ARG_VALUE_LEN: usize = 50;
const MAX_ARGS_MENTIONED: usize = 5;

pub fn build_prompt(request: &RephraseRequest) -> String {
    match request {
        RephraseRequest::QueryIntent {
            user_query,
            tools_involved,
        } => query_intent_prompt(user_query, tools_involved),
        RephraseRequest::ToolCall {
            user_query,
            tool_name,
            description,
            arguments,
            avoid,
            quiet,
        } => {
            if *quiet {
                quiet_tool_prompt(user_query, tool_name)
            } else {
                tool_call_prompt(user_query, tool_name, description, arguments, avoid)
            }
        }
        RephraseRequest::Progress {
            messages,
            spoken,
            raw,
        } => progress_prompt(messages, spoken, raw),
    }
}

fn query_intent_prompt(user_query: &str, tools_involved: &[String]) -> String {
    let mut p = format!(
        "You are a helpful voice assistant. The user just asked: \"{user_query}\"\n"
    );
    if !tools_involved.is_empty() {
        let shown: Vec<&str> = tools_involved.iter().take(3).map(|s| s.as_str()).collect();
        let _ = writeln!(p, "You will be working with these tools: {}", shown.join(", "));
    }
    p.push_str(
        "\nYou are about to work through this request. Say one brief, confident \
         opening sentence (12-15 words) acknowledging what you will do, in \
         casual speech. Start with something like \"OK, I'm going to...\", \
         \"Let me...\", or \"Alright, I'll...\". Reply with the sentence only.\n",
    );
    p
}

fn quiet_tool_prompt(user_query: &str, tool_name: &str) -> String {
    format!(
        "You are doing background prep work before answering. The user asked: \
         \"{user_query}\". You are calling a technical tool ({tool_name}) to \
         gather metadata. Say something very brief (4-8 words) that sounds \
         like you are thinking, such as \"OK, just gathering some information\" \
         or \"Bear with me, I won't be long\". Reply with the phrase only.\n"
    )
}

fn tool_call_prompt(
    user_query: &str,
    tool_name: &str,
    description: &str,
    arguments: &serde_json::Value,
    avoid: &[String],
) -> String {
    let mut p = format!(
        "You are a helpful voice assistant. The user just asked: \"{user_query}\"\n\
         You are about to call a tool to get their answer.\n\nTool details:\n- Name: {tool_name}\n"
    );
    if !description.is_empty() {
        let _ = writeln!(p, "- Purpose: {description}");
    }
    let specifics = describe_arguments(arguments);
    if !specifics.is_empty() {
        p.push_str("- Specific parameters:\n");
        for s in &specifics {
            let _ = writeln!(p, "  {s}");
        }
    }
    p.push_str(
        "\nSay one brief natural phrase (6-12 words) describing what you are \
         doing. Mention any specific names, dates, or identifiers from the \
         parameters; never a generic \"fetching that data\". Sound like casual \
         speech, not a technical description.\n",
    );
    if !avoid.is_empty() {
        p.push_str("\nYou already said these phrases, so say something different:\n");
        for a in avoid {
            let _ = writeln!(p, "- {a}");
        }
    }
    p.push_str("\nReply with the phrase only.\n");
    p
}

fn progress_prompt(messages: &[String], spoken: &[String], raw: &[String]) -> String {
    let mut p = String::from(
        "You are giving someone quick casual updates while you work on their request.\n\n",
    );
    if messages.len() == 1 {
        let _ = writeln!(p, "System message: \"{}\"", messages[0]);
    } else {
        let _ = writeln!(p, "The system sent {} quick updates:", messages.len());
        for m in messages {
            let _ = writeln!(p, "- \"{m}\"");
        }
        p.push_str("Summarize what is happening overall; do not list each step.\n");
    }
    if !spoken.is_empty() {
        p.push_str("\nYou already told the user:\n");
        for s in spoken {
            let _ = writeln!(p, "- \"{s}\"");
        }
        p.push_str("Say something different this time; build on the narrative.\n");
    }
    if raw.len() > 1 {
        p.push_str("\nRecent raw updates from the system:\n");
        for r in raw {
            let _ = writeln!(p, "- {r}");
        }
        p.push_str("Reflect what changed in the latest one.\n");
    }
    p.push_str(
        "\nTurn this into a super casual spoken update, 3-6 words, like \
         thinking out loud: \"Got it\", \"Hmm, lots of rows\", \"Almost \
         there\". Never procedural phrasing like \"Gathering all sales \
         records\". Reply with the phrase only.\n",
    );
    p
}

/// Pick the arguments a listener would care about: priority keys first,
/// generic plumbing skipped, long values truncated, capped at five.
fn describe_arguments(arguments: &serde_json::Value) -> Vec<String> {
    let Some(map) = arguments.as_object() else {
        return Vec::new();
    };
    let mut out = Vec::new();

    for key in PRIORITY_KEYS {
        if let Some(v) = map.get(*key) {
            if !v.is_null() {
                out.push(format!("{key}: {}", render_value(v)));
            }
        }
    }
    for (key, v) in map {
        if v.is_null()
            || PRIORITY_KEYS.contains(&key.as_str())
            || SKIP_KEYS.contains(&key.as_str())
        {
            continue;
        }
        out.push(format!("{key}: {}", render_value(v)));
    }
    out.truncate(MAX_ARGS_MENTIONED);
    out
}

fn render_value(v: &serde_json::Value) -> String {
    let s = match v {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    if s.len() > MAX_ARG_VALUE_LEN {
        let cut: String = s.chars().take(MAX_ARG_VALUE_LEN).collect();
        format!("{cut}...")
    } else {
        s
    }
}
