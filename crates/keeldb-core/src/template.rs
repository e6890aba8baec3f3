use crate::filter::ClauseSet;
use std::{collections::BTreeMap, fmt};

///
/// QueryKind
///
/// The fixed set of per-table statement templates. Settings overrides are
/// keyed by the same names the template set uses internally.
///

#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd)]
pub enum QueryKind {
    Row,
    List,
    Insert,
    Update,
    Del,
    DelWhere,
    Count,
}

impl QueryKind {
    pub const ALL: [Self; 7] = [
        Self::Row,
        Self::List,
        Self::Insert,
        Self::Update,
        Self::Del,
        Self::DelWhere,
        Self::Count,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Row => "row",
            Self::List => "list",
            Self::Insert => "insert",
            Self::Update => "update",
            Self::Del => "del",
            Self::DelWhere => "delWhere",
            Self::Count => "count",
        }
    }

    /// Resolve a settings key into a template kind.
    #[must_use]
    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == key)
    }
}

impl fmt::Display for QueryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

///
/// Segment
/// One parsed piece of a template: literal text or a named clause slot.
///

#[derive(Clone, Debug, Eq, PartialEq)]
enum Segment {
    Text(String),
    Slot(String),
}

///
/// Template
///
/// A statement template parsed once at construction. `{{slot}}` markers
/// become named slots; rendering fills each slot from a [`ClauseSet`] with a
/// leading space and drops unfilled slots, so no marker text can reach the
/// executor.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Template {
    source: String,
    segments: Vec<Segment>,
}

impl Template {
    /// Parse a template string. An unterminated `{{` is kept as literal text.
    #[must_use]
    pub fn parse(source: &str) -> Self {
        let mut segments = Vec::new();
        let mut text = String::new();
        let mut rest = source;

        while let Some(open) = rest.find("{{") {
            let after = &rest[open + 2..];

            let Some(close) = after.find("}}") else {
                text.push_str(rest);
                rest = "";
                break;
            };

            text.push_str(&rest[..open]);
            if !text.is_empty() {
                segments.push(Segment::Text(std::mem::take(&mut text)));
            }
            segments.push(Segment::Slot(after[..close].trim().to_string()));
            rest = &after[close + 2..];
        }

        text.push_str(rest);
        if !text.is_empty() {
            segments.push(Segment::Text(text));
        }

        Self {
            source: source.to_string(),
            segments,
        }
    }

    /// The template text as declared, markers included.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Slot names in template order, duplicates included.
    pub fn slots(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|segment| match segment {
            Segment::Slot(name) => Some(name.as_str()),
            Segment::Text(_) => None,
        })
    }

    /// Render the template against accumulated clause text.
    ///
    /// Filled slots are substituted space-prefixed; unfilled slots render as
    /// nothing at all.
    #[must_use]
    pub fn render(&self, clauses: &ClauseSet) -> String {
        let mut out = String::with_capacity(self.source.len());

        for segment in &self.segments {
            match segment {
                Segment::Text(text) => out.push_str(text),
                Segment::Slot(name) => {
                    if let Some(text) = clauses.text(name) {
                        out.push(' ');
                        out.push_str(text);
                    }
                }
            }
        }

        out
    }
}

///
/// TemplateSet
///
/// The per-table statement templates, defaults derived from the table name
/// and identity clause, any of them replaceable verbatim by settings.
///

#[derive(Clone, Debug)]
pub struct TemplateSet {
    templates: BTreeMap<QueryKind, Template>,
}

impl TemplateSet {
    /// Build the default MySQL-dialect template set for a table.
    ///
    /// Identity-addressed templates (`row`, `update`, `del`) are built even
    /// when `identity_clause` is absent; the operations guard on the clause
    /// before using them.
    #[must_use]
    pub fn defaults(table: &str) -> Self {
        let mut templates = BTreeMap::new();

        templates.insert(
            QueryKind::Row,
            Template::parse(&format!(
                "SELECT {{{{select}}}} FROM `{table}` {{{{join}}}} WHERE {{{{whereClause}}}} {{{{where}}}} {{{{group}}}} {{{{having}}}} {{{{order}}}} {{{{limit}}}}"
            )),
        );
        templates.insert(
            QueryKind::List,
            Template::parse(&format!(
                "SELECT {{{{select}}}} FROM `{table}` {{{{join}}}} WHERE 1 {{{{where}}}} {{{{group}}}} {{{{having}}}} {{{{order}}}} {{{{limit}}}}"
            )),
        );
        templates.insert(
            QueryKind::Insert,
            Template::parse(&format!(
                "INSERT INTO `{table}` ({{{{columns}}}}) VALUES ({{{{values}}}}) {{{{duplicate}}}}"
            )),
        );
        templates.insert(
            QueryKind::Update,
            Template::parse(&format!(
                "UPDATE `{table}` SET {{{{values}}}} WHERE {{{{whereClause}}}}"
            )),
        );
        templates.insert(
            QueryKind::Del,
            Template::parse(&format!("DELETE FROM `{table}` WHERE {{{{whereClause}}}}")),
        );
        templates.insert(
            QueryKind::DelWhere,
            Template::parse(&format!("DELETE FROM `{table}` WHERE 1 {{{{where}}}}")),
        );
        templates.insert(
            QueryKind::Count,
            Template::parse(&format!(
                "SELECT COUNT(*) AS `count` FROM `{table}` {{{{join}}}} WHERE 1 {{{{where}}}} {{{{group}}}} {{{{having}}}}"
            )),
        );

        Self { templates }
    }

    /// Replace one template verbatim. The override is parsed the same way as
    /// the defaults.
    pub fn set(&mut self, kind: QueryKind, source: &str) {
        self.templates.insert(kind, Template::parse(source));
    }

    #[must_use]
    pub fn get(&self, kind: QueryKind) -> &Template {
        // All seven kinds are inserted by `defaults` and `set` never removes.
        &self.templates[&kind]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_splits_text_and_slots() {
        let template = Template::parse("SELECT {{select}} FROM `t` WHERE 1 {{where}}");

        assert_eq!(
            template.slots().collect::<Vec<_>>(),
            vec!["select", "where"]
        );
        assert_eq!(template.source(), "SELECT {{select}} FROM `t` WHERE 1 {{where}}");
    }

    #[test]
    fn render_fills_slots_space_prefixed_and_drops_empty() {
        let template = Template::parse("SELECT{{select}} FROM `t` WHERE 1{{where}}{{order}}");
        let mut clauses = ClauseSet::new();
        clauses.set("select", "`a`, `b`");
        clauses.add("where", "AND `a` = \"?\"", "AND `a` = \"1\"");

        assert_eq!(
            template.render(&clauses),
            "SELECT `a`, `b` FROM `t` WHERE 1 AND `a` = \"1\"",
            "fills carry their own leading space; the empty order slot vanishes"
        );
    }

    #[test]
    fn render_never_leaks_marker_text() {
        let template = Template::parse("DELETE FROM `t` WHERE 1 {{where}}");
        let rendered = template.render(&ClauseSet::new());

        assert!(
            !rendered.contains("{{"),
            "unfilled markers must vanish: {rendered}"
        );
        assert_eq!(rendered, "DELETE FROM `t` WHERE 1 ");
    }

    #[test]
    fn parse_keeps_unterminated_marker_as_text() {
        let template = Template::parse("SELECT {{oops FROM `t`");

        assert_eq!(template.slots().count(), 0);
        assert_eq!(template.render(&ClauseSet::new()), "SELECT {{oops FROM `t`");
    }

    #[test]
    fn defaults_cover_every_kind() {
        let set = TemplateSet::defaults("users");

        for kind in QueryKind::ALL {
            let template = set.get(kind);
            assert!(
                template.source().contains("`users`"),
                "{kind} template must name the table: {}",
                template.source()
            );
        }
    }

    #[test]
    fn set_replaces_a_template_verbatim() {
        let mut set = TemplateSet::defaults("users");
        set.set(QueryKind::List, "SELECT `id` FROM `users_view` WHERE 1 {{where}}");

        assert_eq!(
            set.get(QueryKind::List).source(),
            "SELECT `id` FROM `users_view` WHERE 1 {{where}}"
        );
        assert_eq!(
            set.get(QueryKind::Row).source(),
            TemplateSet::defaults("users").get(QueryKind::Row).source(),
            "other templates stay at their defaults"
        );
    }

    #[test]
    fn from_key_resolves_settings_names() {
        assert_eq!(QueryKind::from_key("delWhere"), Some(QueryKind::DelWhere));
        assert_eq!(QueryKind::from_key("insert"), Some(QueryKind::Insert));
        assert_eq!(QueryKind::from_key("upsert"), None);
    }
}
