//! Assemble the emitted code with the system C compiler, run it and check the
//! exit status. Skipped on hosts without an x86-64 Linux toolchain.

use std::fs;
use std::process::Command;

use anyhow::{Result, ensure};
use tempfile::tempdir;

fn toolchain_available() -> bool {
  cfg!(all(target_arch = "x86_64", target_os = "linux"))
    && Command::new("cc")
      .arg("--version")
      .output()
      .map(|out| out.status.success())
      .unwrap_or(false)
}

/// Exit status of the compiled program, or `None` when the test is skipped.
fn exit_status(source: &str) -> Result<Option<i32>> {
  if !toolchain_available() {
    eprintln!("skipping: no x86-64 C toolchain available");
    return Ok(None);
  }

  let asm = gocc::generate_assembly(source)?;
  let dir = tempdir()?;
  let asm_path = dir.path().join("prog.s");
  let bin_path = dir.path().join("prog");
  fs::write(&asm_path, asm)?;

  let status = Command::new("cc")
    .arg("-o")
    .arg(&bin_path)
    .arg(&asm_path)
    .status()?;
  ensure!(status.success(), "cc failed for {source:?}");

  let status = Command::new(&bin_path).status()?;
  Ok(status.code())
}

fn assert_exit(source: &str, expected: i32) -> Result<()> {
  if let Some(code) = exit_status(source)? {
    assert_eq!(code, expected, "{source}");
  }
  Ok(())
}

#[test]
fn returns_constant_arithmetic() -> Result<()> {
  assert_exit("package main\n\nfunc main() {\n\treturn 40 + 2\n}\n", 42)
}

#[test]
fn initialized_locals_add_up() -> Result<()> {
  assert_exit("func main() { var x int = 40; var y int = 2; return x + y }", 42)
}

#[test]
fn if_takes_the_right_branch() -> Result<()> {
  assert_exit("func main() { if 1 < 2 { return 1 }; return 0 }", 1)?;
  assert_exit("func main() { if 2 < 1 { return 1 }; return 0 }", 0)?;
  assert_exit("func main() { x := 0; if 1 < 2 { x = 1 }; return x }", 1)?;
  assert_exit("func main() { x := 0; if 2 < 1 { x = 1 }; return x }", 0)?;
  assert_exit(
    "func main() { x := 5; if x > 9 { return 1 } else if x > 4 { return 2 } else { return 3 } }",
    2,
  )
}

#[test]
fn loop_sums_to_fifteen() -> Result<()> {
  assert_exit(
    "func main() {\n\tsum := 0\n\tfor i := 1; i <= 5; i = i + 1 {\n\t\tsum = sum + i\n\t}\n\treturn sum\n}\n",
    15,
  )?;
  assert_exit("func main() { n := 0; for n < 7 { n = n + 1 }; return n }", 7)
}

#[test]
fn recursion() -> Result<()> {
  assert_exit(
    "func fib(n int) int {\n if n < 2 {\n  return n\n }\n return fib(n - 1) + fib(n - 2)\n}\nfunc main() { return fib(10) }",
    55,
  )
}

#[test]
fn functions_can_be_called_before_their_definition() -> Result<()> {
  assert_exit("func main() { return twice(21) }\nfunc twice(x int) int { return x * 2 }", 42)
}

#[test]
fn more_than_six_arguments() -> Result<()> {
  assert_exit(
    "func f(a, b, c, d, e, g, h, k int) int { return a + b + c + d + e + g + h * k }\nfunc main() { return f(1, 2, 3, 4, 5, 6, 7, 8) }",
    77,
  )
}

#[test]
fn multiple_results() -> Result<()> {
  assert_exit(
    "func divmod(a, b int) (int, int) { return a / b, a - a / b * b }\nfunc main() { q, r := divmod(17, 5); return q * 10 + r }",
    32,
  )?;
  assert_exit(
    "func pair() (int, bool) { return 4, true }\nfunc relay() (int, bool) { return pair() }\nfunc main() { var n int; var ok bool; n, ok = relay(); if ok { return n }; return 0 }",
    4,
  )
}

#[test]
fn parallel_assignment_swaps() -> Result<()> {
  assert_exit("func main() { a, b := 1, 2; a, b = b, a; return a * 10 + b }", 21)
}

#[test]
fn shadowed_variable_leaves_outer_untouched() -> Result<()> {
  assert_exit("func main() { x := 1; if true { x := 2; x = x + 1 }; return x }", 1)
}

#[test]
fn pointers_write_through() -> Result<()> {
  assert_exit(
    "func set(p *int, v int) { *p = v }\nfunc main() { x := 1; set(&x, 9); return x }",
    9,
  )
}

#[test]
fn top_level_variables_start_zeroed() -> Result<()> {
  assert_exit(
    "var counter int\nfunc bump() { counter = counter + 1 }\nfunc main() { bump(); bump(); bump(); return counter }",
    3,
  )
}

#[test]
fn arrays_are_zero_filled_and_indexable() -> Result<()> {
  assert_exit(
    "func main() { var a [5]int; for i := 1; i < 5; i = i + 1 { a[i] = i * i }; return a[4] + a[0] + len(a) }",
    21,
  )
}

#[test]
fn structs_by_value_and_through_pointers() -> Result<()> {
  assert_exit(
    "type Point struct { x, y int }\nfunc area(p Point) int { return p.x * p.y }\nfunc main() { p := Point{x: 3, y: 4}; q := &p; q.x = 5; return area(p) }",
    20,
  )?;
  assert_exit(
    "type Bag struct {\n items [3]int\n n int\n}\nfunc main() { b := Bag{n: 2}; b.items[1] = 5; c := b; b.n = 9; return c.items[1] + c.n }",
    7,
  )
}

#[test]
fn slices_grow_with_append() -> Result<()> {
  assert_exit(
    "func main() {\n s := []int{1, 2}\n for i := 0; i < 10; i = i + 1 {\n  s = append(s, i)\n }\n total := 0\n for i := 0; i < len(s); i = i + 1 {\n  total = total + s[i]\n }\n return total + len(s)\n}",
    60,
  )?;
  assert_exit("func main() { var s []int; n := len(s); s = append(s, 4); return n + s[0] }", 4)?;
  assert_exit(
    "type Point struct { x, y int }\nfunc main() { ps := []Point{}; ps = append(ps, Point{x: 1, y: 2}); ps = append(ps, Point{x: 3, y: 4}); return ps[1].x + ps[0].y }",
    5,
  )
}

#[test]
fn append_to_a_copy_leaves_the_original_alone() -> Result<()> {
  assert_exit(
    "func main() { s := []int{1}; s = append(s, 2); t := s; t = append(t, 5); return len(s) }",
    2,
  )?;
  // Elements are shared while there is spare capacity, as in Go.
  assert_exit(
    "func main() { s := []int{1}; s = append(s, 2); t := append(s, 5); u := append(s, 7); return t[2] * 10 + len(t) }",
    73,
  )?;
  // Growing copies into a new array, so the old slice keeps its elements.
  assert_exit(
    "func main() { s := []int{1, 2}; t := append(s, 3); t[0] = 9; return s[0] * 10 + len(s) + t[2] }",
    15,
  )
}

#[test]
fn append_inside_a_nested_expression() -> Result<()> {
  assert_exit("func main() { s := []int{7}; return 1 + len(append(s, 3)) }", 3)
}

#[test]
fn strings_are_rune_pointers() -> Result<()> {
  assert_exit("func main() { s := \"A\"; return *s }", 65)
}

#[test]
fn logical_operators_short_circuit() -> Result<()> {
  assert_exit(
    "func boom() bool { var p *int; return *p == 1 }\nfunc main() { if false && boom() { return 1 }; if true || boom() { return 7 }; return 0 }",
    7,
  )?;
  assert_exit("func main() { if !(1 == 2) && 3 >= 3 { return 1 }; return 0 }", 1)
}

#[test]
fn bare_return_from_main_exits_zero() -> Result<()> {
  assert_exit("func main() { x := 3; if x > 1 { return }; return 5 }", 0)
}
