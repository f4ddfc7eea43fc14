//! Command-line parsing (spec §4.6 "the line is parsed as `verb [dobj]
//! [prep iobj]` against the server's preposition table").

/// Preposition groups; members of a group are synonyms for the same
/// argspec match (spec §3.2 `PrepSpec`). Checked longest-phrase-first so
/// `"on top of"` wins over a bare `"on"`.
pub const PREPOSITIONS: &[&[&str]] = &[
    &["with", "using"],
    &["at", "to"],
    &["in front of"],
    &["in", "inside", "into"],
    &["on top of", "on", "onto", "upon"],
    &["out of", "from inside", "from"],
    &["over"],
    &["through"],
    &["under", "underneath", "beneath"],
    &["behind"],
    &["beside"],
    &["for", "about"],
    &["is"],
    &["as"],
    &["off", "off of"],
];

#[derive(Debug, Clone, Default)]
pub struct ParsedCommand {
    pub verb: String,
    pub argstr: String,
    pub args: Vec<String>,
    pub dobjstr: String,
    pub prepstr: String,
    pub iobjstr: String,
}

/// Splits a raw input line into the classic MOO five-tuple. Unlike the
/// scatter-assignment-style `this|none|any` argspec match (done later,
/// once dobj/iobj have been resolved to objects), this step is pure
/// string surgery.
pub fn parse_command(line: &str) -> ParsedCommand {
    let line = line.trim();
    let mut words = line.split_whitespace();
    let verb = words.next().unwrap_or("").to_string();
    let rest: Vec<&str> = words.collect();
    let argstr = rest.join(" ");

    if let Some((prep_idx, prep_len, prep)) = find_preposition(&rest) {
        let dobjstr = rest[..prep_idx].join(" ");
        let iobjstr = rest[prep_idx + prep_len..].join(" ");
        ParsedCommand {
            verb,
            argstr: argstr.clone(),
            args: rest.iter().map(|s| s.to_string()).collect(),
            dobjstr,
            prepstr: prep.to_string(),
            iobjstr,
        }
    } else {
        ParsedCommand {
            verb,
            argstr: argstr.clone(),
            args: rest.iter().map(|s| s.to_string()).collect(),
            dobjstr: argstr,
            prepstr: String::new(),
            iobjstr: String::new(),
        }
    }
}

/// Finds the first (leftmost) preposition phrase in `words`, preferring
/// the longest phrase at a given position. Returns `(word_index,
/// phrase_len_in_words, canonical_text)`.
fn find_preposition(words: &[&str]) -> Option<(usize, usize, &'static str)> {
    for i in 0..words.len() {
        let mut best: Option<(usize, &'static str)> = None;
        for group in PREPOSITIONS {
            for phrase in *group {
                let phrase_words: Vec<&str> = phrase.split(' ').collect();
                if i + phrase_words.len() > words.len() {
                    continue;
                }
                let matches = phrase_words
                    .iter()
                    .zip(&words[i..i + phrase_words.len()])
                    .all(|(p, w)| p.eq_ignore_ascii_case(w));
                if matches && best.map(|(len, _)| phrase_words.len() > len).unwrap_or(true) {
                    best = Some((phrase_words.len(), phrase));
                }
            }
        }
        if let Some((len, phrase)) = best {
            return Some((i, len, phrase));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_verb_dobj_prep_iobj() {
        let p = parse_command("put sword in chest");
        assert_eq!(p.verb, "put");
        assert_eq!(p.dobjstr, "sword");
        assert_eq!(p.prepstr, "in");
        assert_eq!(p.iobjstr, "chest");
    }

    #[test]
    fn no_preposition_is_all_dobj() {
        let p = parse_command("look sword");
        assert_eq!(p.verb, "look");
        assert_eq!(p.dobjstr, "sword");
        assert_eq!(p.prepstr, "");
    }

    #[test]
    fn prefers_longest_preposition_phrase() {
        let p = parse_command("put box on top of shelf");
        assert_eq!(p.dobjstr, "box");
        assert_eq!(p.prepstr, "on top of");
        assert_eq!(p.iobjstr, "shelf");
    }
}
