use gocc::ast::{ExprKind, StmtKind};
use gocc::env::Environment;
use gocc::parser::parse;
use gocc::sema::check;
use gocc::tokenizer::{TokenKind, tokenize};
use gocc::ty::Type;
use gocc::{CompileResult, ErrorKind};
use proptest::prelude::*;

const VOCABULARY: &[&str] = &[
  "x", "foo_1", "42", "0", "+", "-", "*", "/", "==", "!=", "<", "<=", ">", ">=", ":=", "=", "&&",
  "||", "!", "&", "(", ")", "{", "}", "[", "]", ",", ".", ":", ";", "\n", "func", "var", "if",
  "for", "return", "struct", "\"hi\"", "\"a b\"",
];

const OPERATORS: &[&str] = &["+", "-", "*", "/", "==", "!=", "<", "<=", ">", ">="];

fn check_source(source: &str) -> CompileResult<(gocc::ast::Program, Environment)> {
  let (mut program, mut env) = parse(tokenize(source)?, source)?;
  check(&mut program, &mut env)?;
  Ok((program, env))
}

fn type_name() -> impl Strategy<Value = (String, usize)> {
  prop_oneof![
    Just(("int".to_string(), 8)),
    Just(("bool".to_string(), 8)),
    Just(("string".to_string(), 8)),
    Just(("[]int".to_string(), 8)),
    (1usize..5).prop_map(|n| (format!("[{n}]int"), n * 8)),
  ]
}

proptest! {
  #![proptest_config(ProptestConfig {
    cases: 128,
    .. ProptestConfig::default()
  })]

  #[test]
  fn token_texts_reassemble_the_input(
    words in prop::collection::vec(prop::sample::select(VOCABULARY), 0..40),
  ) {
    let source = words.join(" ");
    let tokens = tokenize(&source).unwrap();
    prop_assert_eq!(tokens.iter().filter(|t| t.kind == TokenKind::Eof).count(), 1);
    let texts: String = tokens.iter().map(|t| t.text(&source)).collect();
    let joined: String = words.concat();
    prop_assert_eq!(texts, joined);
  }

  #[test]
  fn lexer_never_panics(source in "[ -~\n\t]*") {
    if let Err(err) = tokenize(&source) {
      prop_assert_eq!(err.kind(), ErrorKind::Lex);
      prop_assert!(err.loc() <= source.len());
    }
  }

  #[test]
  fn binary_result_types_follow_the_operator(
    op in prop::sample::select(OPERATORS),
    lhs_is_int in any::<bool>(),
    rhs_is_int in any::<bool>(),
  ) {
    let operand = |is_int: bool| if is_int { "7" } else { "true" };
    let (lhs, rhs) = (operand(lhs_is_int), operand(rhs_is_int));
    let source = format!("func main() {{ v := {lhs} {op} {rhs} }}");
    let arithmetic = matches!(op, "+" | "-" | "*" | "/");
    let equality = matches!(op, "==" | "!=");

    let expected = match (lhs_is_int, rhs_is_int) {
      (true, true) if arithmetic => Some(Type::Int),
      (true, true) => Some(Type::Bool),
      (false, false) if equality => Some(Type::Bool),
      _ => None,
    };

    match (check_source(&source), expected) {
      (Ok((program, _)), Some(want)) => {
        let main = program.functions().next().unwrap();
        let StmtKind::ShortVarDecl { values, .. } = &main.body.stmts[0].kind else {
          panic!("expected a short variable declaration");
        };
        prop_assert!(matches!(values[0].kind, ExprKind::Binary { .. }), "expected a binary expression");
        prop_assert_eq!(&values[0].ty, &want);
      }
      (Err(err), None) => {
        prop_assert_eq!(err.kind(), ErrorKind::Type);
      }
      (result, expected) => {
        prop_assert!(false, "{source}: got {:?}, expected {expected:?}", result.map(|_| ()));
      }
    }
  }

  #[test]
  fn frame_offsets_grow_by_each_variable_size(types in prop::collection::vec(type_name(), 1..12)) {
    let decls: Vec<String> = types
      .iter()
      .enumerate()
      .map(|(i, (name, _))| format!("var v{i} {name}"))
      .collect();
    let source = format!("func main() {{\n{}\n}}", decls.join("\n"));
    let (program, env) = check_source(&source).unwrap();
    let main = program.functions().next().unwrap();

    let mut previous = 0;
    for (stmt, (_, size)) in main.body.stmts.iter().zip(&types) {
      let StmtKind::LocalVar { var, .. } = &stmt.kind else {
        panic!("expected a var declaration");
      };
      let offset = env.variable(*var).offset;
      prop_assert_eq!(offset, previous + size);
      previous = offset;
    }
    let frame = env.function("main").unwrap().frame_size;
    prop_assert!(frame >= previous && frame % 16 == 0 && frame < previous + 16);
  }

  #[test]
  fn string_literals_intern_by_value(values in prop::collection::vec("[a-c]{0,3}", 1..20)) {
    let mut env = Environment::new();
    let labels: Vec<String> = values.iter().map(|v| env.intern_string_literal(v)).collect();
    for (i, a) in values.iter().enumerate() {
      for (j, b) in values.iter().enumerate() {
        prop_assert_eq!(a == b, labels[i] == labels[j]);
      }
    }
  }
}
