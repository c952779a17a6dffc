use crate::context;
use crate::token::CatCode;
use crate::traits::*;
use crate::vm;
use std::collections::HashMap;
use std::fmt::Debug;
use texpand_stdext::collections::groupingmap::Scope;

fn new_vm(source: &str, cat_codes: &[(char, CatCode)]) -> Box<vm::VM<()>> {
    let mut vm = vm::VM::<()>::new(HashMap::new());
    for (c, cat_code) in cat_codes {
        vm.context.set_cat_code(*c, *cat_code, Scope::Global);
    }
    vm.context
        .set(context::Key::EndLineChar, context::Value::Int(-1), Scope::Global);
    vm.push_source("input.tex", source).unwrap();
    vm
}

pub fn run_parse_success_test<T: Parsable<()> + Debug + Eq>(source: &str, want: T) {
    let mut vm = new_vm(source, &[]);
    let input = vm::ExecutionInput::new(&mut vm);
    let got = T::parse(input).unwrap();
    assert_eq!(got, want);
}

pub fn run_parse_failure_test<T: Parsable<()> + Debug>(
    source: &str,
    cat_codes: &[(char, CatCode)],
) {
    let mut vm = new_vm(source, cat_codes);
    let input = vm::ExecutionInput::new(&mut vm);
    let result = T::parse(input);
    match result {
        Ok(value) => panic![
            "Successfully parsed a value '{value:?}' of type '{}' from invalid input '{source}'",
            std::any::type_name::<T>()
        ],
        Err(err) => assert_eq!(err.category(), crate::error::Category::Syntax, "{err}"),
    }
}

macro_rules! parse_success_tests {
    ($( ($name: ident, $input: expr, $expected: expr $(,)? ) ),+ $(,)? ) => {
        $(
        #[test]
        fn $name() {
            let source = $input;
            let want = $expected;
            run_parse_success_test(&source, want);
        }
        )+
    };
}

pub(crate) use parse_success_tests;

macro_rules! parse_failure_tests {
    ( $parsable_type: ty, $cat_codes: tt, $( ($name: ident, $input: expr), )+) => {
        $(
        #[test]
        fn $name() {
            let input = $input;
            run_parse_failure_test::<$parsable_type>(&input, &$cat_codes);
        }
        )+
    };
}

pub(crate) use parse_failure_tests;
