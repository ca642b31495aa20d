use std::sync::{Arc, Mutex};

use camel::builtins::{self, NativeFn};
use camel::value::object::hv::Hv;
use camel::value::object::reference::Reference;
use camel::value::{Av, Scalar};
use camel::Camel;

#[derive(Clone, Default)]
struct Sink(Arc<Mutex<Vec<u8>>>);

impl std::io::Write for Sink {
  fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
    self.0.lock().unwrap().extend_from_slice(buf);
    Ok(buf.len())
  }
  fn flush(&mut self) -> std::io::Result<()> {
    Ok(())
  }
}

fn run(src: &str) -> String {
  let sink = Sink::default();
  let camel = Camel::builder().with_stdout(sink.clone()).build();
  let _: Scalar = camel.eval(src).unwrap();
  String::from_utf8(sink.0.lock().unwrap().clone()).unwrap()
}

#[test]
fn arithmetic_precedence() {
  assert_eq!(run("my $x = 1 + 2 * 3; print $x;"), "7");
}

#[test]
fn array_length_via_scalar_context() {
  assert_eq!(run("my @a = (1,2,3); my $n = scalar @a; print $n;"), "3");
}

#[test]
fn hash_literal_and_lookup() {
  assert_eq!(run("my %h = (a => 1, b => 2); print $h{a} + $h{b};"), "3");
}

#[test]
fn for_loop_over_a_list() {
  assert_eq!(run("for $i (1,2,3) { print $i; }"), "123");
}

#[test]
fn regex_match_binds_numbered_captures() {
  assert_eq!(
    run(r#"my $s = "hello world"; if ($s =~ m/(\w+) (\w+)/) { print "$1,$2"; }"#),
    "hello,world"
  );
}

#[test]
fn sub_call_reads_its_argument_vector() {
  assert_eq!(
    run("sub inc { my @a = @_; return $a[0] + 1; } print inc(10);"),
    "11"
  );
}

// Universal properties (spec.md §8).

#[test]
fn length_of_a_list_literal_matches_its_element_count() {
  for n in 0..5 {
    let elems = (0..n).map(|i| i.to_string()).collect::<Vec<_>>().join(",");
    let src = format!("my @a = ({elems}); my $n = scalar @a; print $n;");
    assert_eq!(run(&src), n.to_string());
  }
}

#[test]
fn as_bool_matches_the_falsy_rules() {
  assert!(!Scalar::Null.as_bool());
  assert!(!Scalar::Int(0).as_bool());
  assert!(!Scalar::str("").as_bool());
  assert!(!Scalar::str("0").as_bool());
  assert!(Scalar::Int(1).as_bool());
  assert!(Scalar::str("0.0").as_bool());
}

#[test]
fn int_to_string_to_int_round_trips() {
  for n in [0_i64, 1, -1, 42, i64::from(i32::MAX)] {
    let s = Scalar::str(Scalar::Int(n).as_string());
    assert_eq!(s.as_int(), n);
  }
}

#[test]
fn hv_round_trips_through_to_av_and_from_av_as_a_set_of_pairs() {
  let mut hv = Hv::new();
  hv.put(Scalar::str("a"), Scalar::Int(1));
  hv.put(Scalar::str("b"), Scalar::Int(2));
  let roundtripped = Hv::from_av(&hv.to_av());
  assert_eq!(roundtripped.get(&Scalar::str("a")).as_int(), 1);
  assert_eq!(roundtripped.get(&Scalar::str("b")).as_int(), 2);
  assert_eq!(roundtripped.len(), hv.len());
}

#[test]
fn reference_identity_is_reflexive_and_distinguishes_distinct_cells() {
  let r = Reference::scalar(Scalar::Int(1));
  let same = Scalar::Ref(r.clone());
  let other = Scalar::Ref(Reference::scalar(Scalar::Int(1)));
  assert_eq!(same, Scalar::Ref(r));
  assert_ne!(same, other);
}

#[test]
fn hv_keys_buffers_with_equal_bytes_into_the_same_slot_regardless_of_identity() {
  let mut hv = Hv::new();
  hv.put(Scalar::buf(b"key".to_vec()), Scalar::Int(1));
  // A distinct `Arc<[u8]>` allocation with the same bytes must hash to the
  // same slot, not a fresh one.
  hv.put(Scalar::buf(b"key".to_vec()), Scalar::Int(2));
  assert_eq!(hv.len(), 1);
  assert_eq!(hv.get(&Scalar::buf(b"key".to_vec())).as_int(), 2);
}

// Host-binding end-to-end: a registered native function reachable from
// script code through a bareword module call, mirroring the embedding shape
// `examples/jprochazk-hebi/tests/e2e.rs` exercises against its own `Hebi`.

fn add_one(thread: &camel::isolate::ThreadState) -> camel::Result<()> {
  let n = thread.native_args().first().cloned().unwrap_or(Scalar::Null).as_int();
  thread.set_native_return(Scalar::Int(n + 1));
  Ok(())
}

#[test]
fn a_registered_host_function_is_callable_as_a_bareword_method() {
  let sink = Sink::default();
  let camel = Camel::builder().with_stdout(sink.clone()).build();
  camel.register_builtins("Util", [NativeFn::new("add_one", add_one)]);

  let _: Scalar = camel.eval("require Util; print Util->add_one(41);").unwrap();
  assert_eq!(String::from_utf8(sink.0.lock().unwrap().clone()).unwrap(), "42");
}

#[test]
fn builtins_register_into_populates_every_supplied_native() {
  let module = camel::value::object::module::Module::new("Math");
  builtins::register_into(
    &module,
    [
      NativeFn::new("add_one", add_one),
      NativeFn::new("add_one_again", add_one),
    ],
  );
  assert!(module.callable("add_one").is_some());
  assert!(module.callable("add_one_again").is_some());
  assert!(module.callable("missing").is_none());
}

#[test]
fn av_store_past_the_end_returns_a_handle_into_the_grown_storage_not_a_stale_one() {
  let mut av = Av::new();
  {
    let mut slot = av.slot(3);
    slot.set(Scalar::Int(99));
  }
  assert_eq!(av.len(), 4);
  assert_eq!(av.fetch(3).as_int(), 99);
}
