//! Behavior of the COPY-to-INSERT rewriter through its public API.

use pgdump_rewriter::rewriter::{
    DefectPolicy, EscapeMode, RewriteDefect, RewriteError, RewriteStats, Rewriter,
    StatementEmitter,
};
use pgdump_rewriter::writer::StatementWriter;

fn rewrite(input: &str) -> (String, RewriteStats) {
    rewrite_with(Rewriter::default(), input).unwrap()
}

fn rewrite_with(rewriter: Rewriter, input: &str) -> Result<(String, RewriteStats), RewriteError> {
    let mut out = StatementWriter::new(Vec::new());
    let stats = rewriter.rewrite(input.as_bytes(), &mut out)?;
    let text = String::from_utf8(out.into_inner().unwrap()).unwrap();
    Ok((text, stats))
}

/// Count top-level items in a parenthesized, comma-separated SQL list,
/// ignoring commas inside single-quoted literals.
fn count_list_items(list: &str) -> usize {
    let mut count = 1;
    let mut in_string = false;
    for c in list.chars() {
        match c {
            '\'' => in_string = !in_string,
            ',' if !in_string => count += 1,
            _ => {}
        }
    }
    count
}

const PG_DUMP: &str = r#"--
-- PostgreSQL database dump
--

SET statement_timeout = 0;
SET client_encoding = 'UTF8';

CREATE TABLE public.users (
    id integer NOT NULL,
    name text,
    email text
);

--
-- Data for Name: users; Type: TABLE DATA; Schema: public; Owner: app
--

COPY public.users (id, name, email) FROM stdin;
1	Alice	alice@example.com
2	O'Brien	\N
3		bob@example.com
\.


--
-- Data for Name: orders; Type: TABLE DATA; Schema: public; Owner: app
--

COPY public.orders (id, user_id, note) FROM stdin;
10	1	first, with comma
11	2	\N
\.


SELECT pg_catalog.setval('public.users_id_seq', 3, true);
"#;

#[test]
fn test_scenario_schema_quoted_table_with_null() {
    let (text, stats) = rewrite("COPY \"s\".t (a, b) FROM stdin;\n1\tfoo\n2\t\\N\n\\.\n");
    assert_eq!(
        text,
        "INSERT INTO \"s\".t (a, b) VALUES ('1', 'foo');\n\
         INSERT INTO \"s\".t (a, b) VALUES ('2', NULL);\n"
    );
    assert_eq!(stats.statements_written, 2);
}

#[test]
fn test_scenario_quote_doubling() {
    let (text, _) = rewrite("COPY people (name) FROM stdin;\nO'Brien\n\\.\n");
    assert_eq!(text, "INSERT INTO people (name) VALUES ('O''Brien');\n");
}

#[test]
fn test_scenario_empty_block() {
    let (text, stats) = rewrite("COPY t (a, b) FROM stdin;\n\\.\n");
    assert!(text.is_empty());
    assert_eq!(stats.blocks_converted, 1);
    assert_eq!(stats.statements_written, 0);
}

#[test]
fn test_scenario_short_row_is_arity_defect() {
    let err = rewrite_with(
        Rewriter::default(),
        "COPY public.t (a, b, c) FROM stdin;\n1\t2\n\\.\n",
    )
    .unwrap_err();
    match err {
        RewriteError::Defect(RewriteDefect::ArityMismatch {
            line,
            table,
            expected,
            found,
        }) => {
            assert_eq!(line, 2);
            assert_eq!(table, "public.t");
            assert_eq!(expected, 3);
            assert_eq!(found, 2);
        }
        other => panic!("unexpected error: {other}"),
    }

    let (text, stats) = rewrite_with(
        Rewriter::default().with_policy(DefectPolicy::Skip),
        "COPY public.t (a, b, c) FROM stdin;\n1\t2\n4\t5\t6\n\\.\n",
    )
    .unwrap();
    assert_eq!(text, "INSERT INTO public.t (a, b, c) VALUES ('4', '5', '6');\n");
    assert_eq!(stats.rows_skipped, 1);
}

#[test]
fn test_long_row_is_arity_defect() {
    let err = rewrite_with(Rewriter::default(), "COPY t (a) FROM stdin;\n1\t2\n\\.\n").unwrap_err();
    assert!(matches!(
        err,
        RewriteError::Defect(RewriteDefect::ArityMismatch {
            expected: 1,
            found: 2,
            ..
        })
    ));
}

#[test]
fn test_full_dump_ordering_and_counts() {
    let (text, stats) = rewrite(PG_DUMP);
    let lines: Vec<&str> = text.lines().collect();

    assert_eq!(
        lines,
        vec![
            "INSERT INTO public.users (id, name, email) VALUES ('1', 'Alice', 'alice@example.com');",
            "INSERT INTO public.users (id, name, email) VALUES ('2', 'O''Brien', NULL);",
            "INSERT INTO public.users (id, name, email) VALUES ('3', '', 'bob@example.com');",
            "INSERT INTO public.orders (id, user_id, note) VALUES ('10', '1', 'first, with comma');",
            "INSERT INTO public.orders (id, user_id, note) VALUES ('11', '2', NULL);",
        ]
    );
    assert_eq!(stats.blocks_converted, 2);
    assert_eq!(stats.rows_converted, 5);
    assert!(stats.defects.is_empty());
}

#[test]
fn test_column_and_value_counts_match() {
    let (text, _) = rewrite(PG_DUMP);
    for stmt in text.lines() {
        let cols_start = stmt.find(" (").unwrap() + 2;
        let cols_end = stmt.find(") VALUES (").unwrap();
        let vals_start = cols_end + ") VALUES (".len();
        let vals_end = stmt.len() - ");".len();

        let columns = count_list_items(&stmt[cols_start..cols_end]);
        let values = count_list_items(&stmt[vals_start..vals_end]);
        assert_eq!(columns, 3, "{stmt}");
        assert_eq!(values, columns, "{stmt}");
    }
}

#[test]
fn test_null_and_empty_string_stay_distinct() {
    let (text, _) = rewrite("COPY t (a, b) FROM stdin;\n\\N\t\n\\.\n");
    assert_eq!(text, "INSERT INTO t (a, b) VALUES (NULL, '');\n");
}

#[test]
fn test_non_block_lines_produce_nothing() {
    let input = "SET x = 1;\n1\tfoo\n\\.\nCOPY t FROM stdin;\n-- comment\n";
    let (text, stats) = rewrite(input);
    assert!(text.is_empty());
    assert_eq!(stats.lines_skipped, 5);
    assert_eq!(stats.blocks_converted, 0);
}

#[test]
fn test_malformed_header_is_skipped_and_later_blocks_convert() {
    let input = "COPY broken (a, b FROM stdin;\nCOPY t (a) FROM stdin;\nx\n\\.\n";
    let (text, _) = rewrite(input);
    assert_eq!(text, "INSERT INTO t (a) VALUES ('x');\n");
}

#[test]
fn test_unterminated_block_is_reported() {
    let err = rewrite_with(
        Rewriter::default(),
        "COPY t (a) FROM stdin;\n1\n\\.\nCOPY u (b) FROM stdin;\n2\n",
    )
    .unwrap_err();
    assert!(matches!(
        err,
        RewriteError::Defect(RewriteDefect::UnterminatedBlock { header_line: 4, rows: 1, .. })
    ));
}

#[test]
fn test_decode_escapes_mode() {
    let emitter = StatementEmitter::new(EscapeMode::Decode);
    let (text, _) = rewrite_with(
        Rewriter::new(emitter),
        "COPY t (a, b) FROM stdin;\nline1\\nline2\tC:\\\\dir\\\\it's\n\\.\n",
    )
    .unwrap();
    assert_eq!(
        text,
        "INSERT INTO t (a, b) VALUES ('line1\nline2', 'C:\\dir\\it''s');\n"
    );
}

#[test]
fn test_passthrough_keeps_dump_escapes() {
    let (text, _) = rewrite("COPY t (a) FROM stdin;\nx\\ty\\\\z\n\\.\n");
    assert_eq!(text, "INSERT INTO t (a) VALUES ('x\\ty\\\\z');\n");
}

#[test]
fn test_batched_statements_keep_row_order() {
    let emitter = StatementEmitter::default().with_batch_size(2);
    let (text, stats) = rewrite_with(
        Rewriter::new(emitter),
        "COPY t (a) FROM stdin;\n1\n2\n3\n\\.\nCOPY u (b) FROM stdin;\n4\n\\.\n",
    )
    .unwrap();
    assert_eq!(
        text,
        "INSERT INTO t (a) VALUES ('1'), ('2');\n\
         INSERT INTO t (a) VALUES ('3');\n\
         INSERT INTO u (b) VALUES ('4');\n"
    );
    assert_eq!(stats.rows_converted, 4);
    assert_eq!(stats.statements_written, 3);
}
