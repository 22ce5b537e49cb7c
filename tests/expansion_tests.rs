//! Simple macros and the expansion automaton, observed through `Session::expand`.

mod common;

use common::{expand, expand_err, line_of, session, tokens};
use lexmacro::{ErrorType, MacroDefinition, MacroKind, Token};

#[test]
fn text_without_macros_round_trips() {
    let text = "local t = { 'a', \"b\", [[c]] } -- note\n--[==[ long\ncomment ]==]\nreturn #t\n";
    assert_eq!(expand(text), text);
}

#[test]
fn simple_macro_is_substituted() {
    assert_eq!(expand("macro PI \"3.14\"\nlocal x = PI * 2"), "\nlocal x = 3.14 * 2");
}

#[test]
fn names_are_matched_as_characters_not_identifiers() {
    assert_eq!(expand("macro <> \"~=\"\nif a <> b then end"), "\nif a ~= b then end");
    assert_eq!(expand("macro X \"1\"\nXX aXb"), "\n11 a1b");
}

#[test]
fn failed_partial_match_falls_back_character_by_character() {
    let out = expand("macro AB \"1\"\nmacro AC \"2\"\nAD AB AC A");
    assert_eq!(out, "\n\nAD 1 2 A");
}

#[test]
fn shorter_name_wins_over_longer_extension() {
    let mut s = session();
    let out = s.expand("t", "macro A \"1\"\nmacro AB \"2\"\nAB").unwrap();
    assert_eq!(out, "\n\n1B");
    assert!(s.registry().contains("AB"));
}

#[test]
fn redefinition_replaces_the_binding() {
    let out = expand("macro V \"1\"\nV\nmacro V \"2\"\nV\nmacro V \"2\"\nV");
    assert_eq!(out, "\n1\n\n2\n\n2");
}

#[test]
fn no_expansion_inside_strings_or_comments() {
    let text = "macro X \"1\"\nprint(\"X\", 'X', [[X]], [==[X]==]) -- X\n--[[ X\nX ]] X";
    assert_eq!(expand(text), "\nprint(\"X\", 'X', [[X]], [==[X]==]) -- X\n--[[ X\nX ]] 1");
}

#[test]
fn expansion_right_after_a_string_closes() {
    assert_eq!(expand("macro X \"1\"\nprint(\"a\"..X)"), "\nprint(\"a\"..1)");
}

#[test]
fn expansion_is_not_rescanned() {
    assert_eq!(expand("macro A \"B\"\nmacro B \"A\"\nA B"), "\n\nB A");
}

#[test]
fn macros_may_expand_to_definitions() {
    let mut s = session();
    s.registry_mut()
        .define("DEF", MacroDefinition::Simple("macro Y \"42\"".to_string()))
        .unwrap();
    let out = s.expand("t", "DEF\nY").unwrap();
    assert_eq!(out, "\n42");
    assert_eq!(s.registry().lookup("Y"), Some(&MacroDefinition::Simple("42".to_string())));
}

#[test]
fn definitions_are_shared_across_chunks_of_a_session() {
    let mut s = session();
    s.expand("a.lua", "macro ONE \"1\"").unwrap();
    assert_eq!(s.expand("b.lua", "ONE + ONE").unwrap(), "1 + 1");
    assert_eq!(s.registry().entries(), vec![("ONE".to_string(), MacroKind::Simple)]);
}

#[test]
fn tokens_see_the_expansion_and_keep_their_lines() {
    let toks = tokens("macro INC \"+ 1\"\nlocal a = 1\na = a INC\nlocal b");
    let kinds: Vec<&Token> = toks.iter().map(|(t, _)| t).collect();
    assert_eq!(kinds[6..10], [&Token::Name("a".into()), &Token::Plus, &Token::Int(1), &Token::Local]);
    assert_eq!(line_of(&toks, "b"), 4);
}

#[test]
fn trace_records_each_expansion() {
    let mut s = session();
    s.set_trace(true);
    let (_, trace) = s.expand_traced("t", "macro N \"7\"\n\nN N").unwrap();
    assert_eq!(trace.len(), 2);
    assert_eq!(trace[0].name, "N");
    assert_eq!(trace[0].kind, MacroKind::Simple);
    assert_eq!(trace[0].output, "7");
    assert_eq!(trace[0].line, 3);
}

#[test]
fn lexical_errors_in_expanded_text_are_syntax_errors() {
    let err = expand_err("macro BAD \"'oops\"\nlocal s = BAD");
    assert_eq!(err.error_type(), ErrorType::Syntax);
    assert!(err.to_string().contains("unfinished string"), "{}", err);
    assert_eq!(err.line(), Some(2));
}
