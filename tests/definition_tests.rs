//! The definition forms and every way they can be malformed.

mod common;

use common::{expand, expand_err, limited};
use lexmacro::{ErrorType, Limits, MacroDefinition, MacroKind};

#[test]
fn all_three_forms_register() {
    let mut s = common::session();
    let text = "macro S \"s\"\nmacro F (a) return a end\nreadermacro R (advance) return '' end\n";
    assert_eq!(s.expand("t", text).unwrap(), "\n\n\n");
    assert_eq!(
        s.registry().entries(),
        vec![
            ("F".to_string(), MacroKind::Function),
            ("R".to_string(), MacroKind::Reader),
            ("S".to_string(), MacroKind::Simple),
        ]
    );
    assert_eq!(s.registry().lookup("S"), Some(&MacroDefinition::Simple("s".to_string())));
}

#[test]
fn definition_text_is_removed_but_layout_kept() {
    assert_eq!(expand("a = 1 macro X \"2\" b = X"), "a = 1  b = 2");
    assert_eq!(expand("macro\nX\n  \"2\"\nX"), "\n2");
}

#[test]
fn long_string_replacement() {
    assert_eq!(expand("macro Q [[\"quoted\"]]\nQ"), "\n\"quoted\"");
}

#[test]
fn body_keeps_macro_names_unexpanded_until_call() {
    let text = "macro X \"1\"\nmacro F () return 'X' .. X end\nF()";
    let err = expand_err(text);
    // Inside the body X is an ordinary global, and it has no value.
    assert_eq!(err.error_type(), ErrorType::Invocation);
    assert!(err.to_string().contains("attempt to concatenate a nil value"), "{}", err);
}

#[test]
fn nested_blocks_and_parentheses_in_body() {
    let text = "macro F (a)\n\
        local t = { (1), ((2)) }\n\
        local function g() do return a end end\n\
        repeat local k = 1 until true\n\
        return g() .. #t\n\
        end\n\
        F(x)";
    assert_eq!(expand(text), "\nx2");
}

#[test]
fn body_errors_report_body_lines() {
    let err = expand_err("macro F ()\nlocal a = 1\nreturn a +\nend\nF()");
    assert_eq!(err.error_type(), ErrorType::Invocation);
    assert!(err.to_string().starts_with("macro F:4:"), "{}", err);
}

#[test]
fn missing_string_literal() {
    let err = expand_err("macro X 42");
    assert_eq!(err.error_type(), ErrorType::Definition);
    assert_eq!(err.to_string(), "string literal expected after macro name 'X'");
    assert_eq!(err.line(), Some(1));
}

#[test]
fn reader_without_parameter_list() {
    let err = expand_err("readermacro R \"x\"");
    assert_eq!(err.error_type(), ErrorType::Definition);
    assert_eq!(err.to_string(), "reader macro 'R' needs a parameter list");
}

#[test]
fn malformed_names() {
    let err = expand_err("macro\"X\" \"1\"");
    assert_eq!(err.error_type(), ErrorType::Definition);
    assert_eq!(err.to_string(), "expected whitespace after 'macro'");

    let err = expand_err("macro A[[B \"1\"");
    assert_eq!(err.error_type(), ErrorType::Definition);
    assert_eq!(err.to_string(), "invalid macro name 'A[[B'");

    let err = expand_err("macro F(a) return a end");
    assert_eq!(err.to_string(), "invalid macro name 'F(a)'");

    let err = expand_err("macro  X \"1\"");
    assert_eq!(err.error_type(), ErrorType::Definition);
    assert_eq!(err.to_string(), "expected macro name after 'macro'");

    let err = expand_err("readermacro\n\tR (a) return '' end");
    assert_eq!(err.to_string(), "expected macro name after 'readermacro'");

    let err = expand_err("\n\nmacro NAME");
    assert_eq!(err.error_type(), ErrorType::Stream);
    assert_eq!(err.to_string(), "unfinished macro name");
    assert_eq!(err.line(), Some(3));
}

#[test]
fn unterminated_or_unbalanced_bodies() {
    let err = expand_err("macro F (a) if a then return a end");
    assert_eq!(err.error_type(), ErrorType::Stream);
    assert_eq!(err.to_string(), "unfinished macro body");

    let err = expand_err("macro F (a)) return a end");
    assert_eq!(err.error_type(), ErrorType::Definition);
    assert_eq!(err.to_string(), "unbalanced ')' in macro body");
}

#[test]
fn body_overflow() {
    let limits = Limits {
        body_capacity: 40,
        ..Limits::default()
    };
    let mut s = limited(limits);
    s.expand("t", "macro S (a) return a end").unwrap();
    let err = s
        .expand("t", "macro L (a) local b = a .. a .. a .. a .. a return b end")
        .unwrap_err();
    assert_eq!(err.error_type(), ErrorType::Overflow);
    assert_eq!(err.to_string(), "macro expansion overflows body buffer");
}

#[test]
fn replacement_and_lookahead_overflow() {
    let limits = Limits {
        replacement_capacity: 8,
        lookahead_capacity: 3,
        ..Limits::default()
    };
    let mut s = limited(limits);
    assert_eq!(s.expand("t", "macro OK \"12345678\"\nOK").unwrap(), "\n12345678");
    let err = s.expand("t", "macro BIG \"123456789\"\nBIG").unwrap_err();
    assert_eq!(err.error_type(), ErrorType::Overflow);
    assert_eq!(err.to_string(), "macro expansion overflows replacement buffer");

    let err = s.expand("t", "macro ABCD \"x\"\nABCD").unwrap_err();
    assert_eq!(err.to_string(), "macro expansion overflows lookahead buffer");
}
