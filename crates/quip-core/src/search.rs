//! Web-search-style query grammar and relevance scoring.
//!
//! The grammar mirrors what users type into a search box: bare terms are
//! AND-combined, `"quoted phrases"` must appear in sequence, `OR` joins the
//! atoms on either side into an any-of group, and `-term` excludes. Scoring
//! runs over a derived searchable-text representation (the normalised
//! concatenation of a joke's text, setup, and punchline) that the store
//! recomputes whenever the text fields change.
//!
//! Relevance is term-frequency based. Phrase matches weigh more than single
//! terms, and bare multi-term queries earn an adjacency bonus when query
//! terms appear consecutively in the document, so an item containing the
//! words in sequence ranks at least as high as one with them scattered.

// ─── Tokenisation ────────────────────────────────────────────────────────────

/// Lowercase alphanumeric word sequence. Order is preserved so phrase and
/// adjacency checks can run over it.
pub fn tokenize(text: &str) -> Vec<String> {
  text
    .split(|c: char| !c.is_alphanumeric())
    .filter(|w| !w.is_empty())
    .map(str::to_lowercase)
    .collect()
}

/// The derived searchable text stored alongside a joke: its token stream
/// joined with single spaces.
pub fn searchable_text(
  text: &str,
  setup: Option<&str>,
  punchline: Option<&str>,
) -> String {
  let mut tokens = tokenize(text);
  tokens.extend(tokenize(setup.unwrap_or_default()));
  tokens.extend(tokenize(punchline.unwrap_or_default()));
  tokens.join(" ")
}

// ─── Query grammar ───────────────────────────────────────────────────────────

/// A single matchable unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Atom {
  Term(String),
  /// Words that must appear consecutively, in order.
  Phrase(Vec<String>),
}

/// One AND-combined requirement: at least one alternative must match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Clause {
  pub alternatives: Vec<Atom>,
}

/// A parsed query: every clause must match, no excluded atom may match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
  pub clauses:  Vec<Clause>,
  pub excluded: Vec<Atom>,
}

impl Query {
  /// Parse user input. Never fails: malformed input degrades to fewer atoms,
  /// and an input with no usable atoms parses to an empty query.
  pub fn parse(input: &str) -> Self {
    let mut query = Query::default();
    let mut or_pending = false;

    for raw in split_raw_tokens(input) {
      if raw == "OR" {
        // Only meaningful between two atoms.
        or_pending = !query.clauses.is_empty();
        continue;
      }

      let (negated, body) = match raw.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, raw.as_str()),
      };

      let atom = match parse_atom(body) {
        Some(a) => a,
        None => {
          or_pending = false;
          continue;
        }
      };

      if negated {
        query.excluded.push(atom);
      } else if or_pending {
        // Join with the previous clause as an alternative.
        if let Some(last) = query.clauses.last_mut() {
          last.alternatives.push(atom);
        }
      } else {
        query.clauses.push(Clause { alternatives: vec![atom] });
      }
      or_pending = false;
    }

    query
  }

  pub fn is_empty(&self) -> bool {
    self.clauses.is_empty() && self.excluded.is_empty()
  }

  /// Relevance of a document given as an ordered token sequence.
  ///
  /// Returns 0.0 when the document does not match: some clause has no
  /// matching alternative, or an excluded atom is present. Matching
  /// documents always score above zero.
  pub fn score(&self, tokens: &[String]) -> f64 {
    for atom in &self.excluded {
      if atom_count(atom, tokens) > 0 {
        return 0.0;
      }
    }

    let mut score = 0.0;
    for clause in &self.clauses {
      let mut clause_score = 0.0;
      for atom in &clause.alternatives {
        clause_score += atom_score(atom, tokens);
      }
      if clause_score == 0.0 {
        return 0.0;
      }
      score += clause_score;
    }

    if self.clauses.is_empty() {
      // Exclusion-only query: every non-excluded document matches equally.
      return 1.0;
    }

    score + self.adjacency_bonus(tokens)
  }

  /// Bonus for consecutive bare query terms appearing adjacent in the
  /// document, in query order.
  fn adjacency_bonus(&self, tokens: &[String]) -> f64 {
    let terms: Vec<&String> = self
      .clauses
      .iter()
      .filter_map(|c| match c.alternatives.first() {
        Some(Atom::Term(t)) if c.alternatives.len() == 1 => Some(t),
        _ => None,
      })
      .collect();

    let mut bonus = 0.0;
    for pair in terms.windows(2) {
      for w in tokens.windows(2) {
        if w[0] == *pair[0] && w[1] == *pair[1] {
          bonus += 2.0;
        }
      }
    }
    bonus
  }
}

// ─── Internals ───────────────────────────────────────────────────────────────

/// Split on whitespace, keeping double-quoted segments together. The leading
/// `-` of a negated quoted phrase stays attached to its segment.
fn split_raw_tokens(input: &str) -> Vec<String> {
  let mut out = Vec::new();
  let mut current = String::new();
  let mut in_quotes = false;

  for c in input.chars() {
    match c {
      '"' => in_quotes = !in_quotes,
      c if c.is_whitespace() && !in_quotes => {
        if !current.is_empty() {
          out.push(std::mem::take(&mut current));
        }
      }
      c => current.push(c),
    }
  }
  if !current.is_empty() {
    out.push(current);
  }
  out
}

fn parse_atom(body: &str) -> Option<Atom> {
  let words = tokenize(body);
  match words.len() {
    0 => None,
    1 => Some(Atom::Term(words.into_iter().next()?)),
    _ => Some(Atom::Phrase(words)),
  }
}

fn atom_count(atom: &Atom, tokens: &[String]) -> usize {
  match atom {
    Atom::Term(t) => tokens.iter().filter(|w| *w == t).count(),
    Atom::Phrase(words) => {
      if words.len() > tokens.len() {
        return 0;
      }
      tokens.windows(words.len()).filter(|w| *w == words).count()
    }
  }
}

fn atom_score(atom: &Atom, tokens: &[String]) -> f64 {
  let count = atom_count(atom, tokens) as f64;
  match atom {
    Atom::Term(_) => count,
    // Phrases weigh more: per occurrence, per word, doubled.
    Atom::Phrase(words) => count * words.len() as f64 * 2.0,
  }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
