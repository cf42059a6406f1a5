/// Comparison policy for accent features. Tolerant mode maps a fixed set of
/// phoneme confusions onto a shared form before similarity scoring; strict
/// mode compares the lowercased words as-is. The transform is applied to
/// both words of a pair, never to the words reported back to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccentMode {
    Tolerant,
    Strict,
}

impl AccentMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccentMode::Tolerant => "tolerant",
            AccentMode::Strict => "strict",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "tolerant" => Some(AccentMode::Tolerant),
            "strict" => Some(AccentMode::Strict),
            _ => None,
        }
    }

    pub fn apply(&self, word: &str) -> String {
        let word = word.to_lowercase();
        match self {
            AccentMode::Strict => word,
            AccentMode::Tolerant => tolerant_form(&word),
        }
    }
}

// Substitution order matters: "th" collapses to "t" before the onset rule
// so "thi..." becomes "di...", matching how the confusions stack in speech.
fn tolerant_form(word: &str) -> String {
    let substituted = word.replace("th", "t").replace('v', "f").replace('z', "s");
    let collapsed = collapse_r_runs(&substituted);
    voice_unaspirated_onset(&collapsed)
}

fn collapse_r_runs(word: &str) -> String {
    let mut out = String::with_capacity(word.len());
    let mut previous_r = false;
    for ch in word.chars() {
        if ch == 'r' && previous_r {
            continue;
        }
        previous_r = ch == 'r';
        out.push(ch);
    }
    out
}

// "p"/"t"/"k" followed by a vowel at the start of a word sound like their
// voiced counterparts when aspiration is missing.
fn voice_unaspirated_onset(word: &str) -> String {
    let mut chars = word.chars();
    let Some(first) = chars.next() else {
        return String::new();
    };
    let voiced = match first {
        'p' => 'b',
        't' => 'd',
        'k' => 'g',
        _ => return word.to_string(),
    };
    if !chars.next().is_some_and(is_vowel) {
        return word.to_string();
    }
    let mut out = String::with_capacity(word.len());
    out.push(voiced);
    out.push_str(&word[first.len_utf8()..]);
    out
}

fn is_vowel(ch: char) -> bool {
    matches!(ch, 'a' | 'e' | 'i' | 'o' | 'u')
}
