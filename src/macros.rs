pub use enclose::*;

#[macro_export]
macro_rules! reactive {
    (( $($d_tt:tt)* ) $prev:ident => $($b:tt)*) => {
        $crate::reactive($crate::macros::enclose!(($( $d_tt )*) move |$prev| { $($b)* }))
    };
    ($prev:ident => $($b:tt)*) => {
        $crate::reactive(move |$prev| { $($b)* })
    };
}

#[macro_export]
macro_rules! memo {
    (( $($d_tt:tt)* ) => $($b:tt)*) => {
        $crate::Memo::new($crate::macros::enclose!(($( $d_tt )*) move || { $($b)* }))
    };
    (=> $($b:tt)*) => {
        $crate::Memo::new(move || { $($b)* })
    };
}

#[macro_export]
macro_rules! batch {
    (( $($d_tt:tt)* ) => $($b:tt)*) => {
        $crate::batch($crate::macros::enclose!(($( $d_tt )*) move || { $($b)* }))
    };
    (=> $($b:tt)*) => {
        $crate::batch(move || { $($b)* })
    };
}
