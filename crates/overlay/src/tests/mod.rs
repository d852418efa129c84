mod helpers;

mod codec_tests;
mod indexed_tests;
