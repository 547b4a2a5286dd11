#![no_main]

use evnet_dns::{MAX_ANSWERS, MAX_MESSAGE_LEN, MAX_QUESTIONS, Message};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(msg) = Message::unpack(data) {
        assert!(data.len() <= MAX_MESSAGE_LEN);
        assert!(msg.questions.len() <= MAX_QUESTIONS);
        assert!(msg.answers.len() <= MAX_ANSWERS);
    }
});
