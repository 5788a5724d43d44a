//! Static seed catalog: the curriculum per locale and the lessons shipped with the binary.
//!
//! Seeded lessons are the zero-latency tier of lesson resolution: a topic found here never
//! touches the cache or the network.

use crate::domain::{lesson_key, Chapter, DialogueLine, GrammarPoint, LessonContent, Locale, QuizItem, VocabularyItem};

/// Seeded lesson for `(locale, topic)`, if one ships with the app.
pub fn lookup(locale: Locale, topic: &str) -> Option<LessonContent> {
  match lesson_key(locale, topic).as_str() {
    "TW-Xin Chào (打招呼)" => Some(tw_greetings()),
    "VN-Xin Chào (你好)" => Some(vn_greetings()),
    _ => None,
  }
}

/// Curriculum shown on the home screen.
pub fn chapters(locale: Locale) -> &'static [Chapter] {
  match locale {
    Locale::Tw => &CHAPTERS_TW,
    Locale::Vn => &CHAPTERS_VN,
  }
}

const CHAPTERS_TW: [Chapter; 6] = [
  Chapter {
    id: "Bai 1",
    title: "Xin Chào (打招呼)",
    description: "學習基本的問候語、自我介紹與禮貌用語。",
    image_seed: 124,
    image_prompt: "Anime style, Studio Ghibli style, A warm morning in Hanoi, two friendly students bowing and saying hello in a sunny street with yellow french colonial buildings",
  },
  Chapter {
    id: "Bai 2",
    title: "Bạn Tên Là Gì? (你叫什麼名字?)",
    description: "詢問姓名、國籍以及職業的常用句型。",
    image_seed: 85,
    image_prompt: "Anime style, Studio Ghibli style, two people shaking hands and introducing themselves in a cozy coffee shop in Vietnam, soft lighting",
  },
  Chapter {
    id: "Bai 3",
    title: "Số Đếm (數字)",
    description: "學習 1-100 的數字、電話號碼與年齡表達。",
    image_seed: 22,
    image_prompt: "Anime style, Studio Ghibli style, a colorful traditional Vietnamese market scene with price tags and fruits, bright colors",
  },
  Chapter {
    id: "Bai 4",
    title: "Mua Sắm (購物)",
    description: "詢問價格、殺價與市場購物的實用對話。",
    image_seed: 41,
    image_prompt: "Anime style, Studio Ghibli style, a busy shopping street in Saigon, people buying clothes and souvenirs, detailed background",
  },
  Chapter {
    id: "Bai 5",
    title: "Gọi Món (點餐)",
    description: "在餐廳閱讀菜單、點菜與用餐禮儀。",
    image_seed: 55,
    image_prompt: "Anime style, Studio Ghibli style, delicious Vietnamese Pho noodles and spring rolls on a table, people eating happily in a restaurant",
  },
  Chapter {
    id: "Bai 6",
    title: "Hỏi Đường (問路)",
    description: "方向指引、交通工具與距離的表達方式。",
    image_seed: 120,
    image_prompt: "Anime style, Studio Ghibli style, a person holding a map asking for directions on a street corner with motorbikes passing by",
  },
];

const CHAPTERS_VN: [Chapter; 6] = [
  Chapter {
    id: "Bài 1",
    title: "Xin Chào (你好)",
    description: "Học cách chào hỏi cơ bản và giới thiệu bản thân.",
    image_seed: 201,
    image_prompt: "Anime style, Studio Ghibli style, A modern Taipei street scene with Taipei 101 in background, two young people waving hello",
  },
  Chapter {
    id: "Bài 2",
    title: "Bạn Tên Gì? (你叫什麼名字?)",
    description: "Cách hỏi tên, quốc tịch và nghề nghiệp.",
    image_seed: 202,
    image_prompt: "Anime style, Studio Ghibli style, A university classroom setting, students introducing themselves, gentle atmosphere",
  },
  Chapter {
    id: "Bài 3",
    title: "Số Đếm (數字)",
    description: "Học số đếm 1-100, số điện thoại và tuổi.",
    image_seed: 203,
    image_prompt: "Anime style, Studio Ghibli style, A night market scene in Taiwan with neon numbers and price signs, bustling atmosphere",
  },
  Chapter {
    id: "Bài 4",
    title: "Mua Sắm (購物)",
    description: "Hỏi giá, trả giá và mua sắm tại chợ.",
    image_seed: 204,
    image_prompt: "Anime style, Studio Ghibli style, Inside a convenience store or bubble tea shop, exchanging money and goods",
  },
  Chapter {
    id: "Bài 5",
    title: "Ăn Uống (飲食)",
    description: "Cách gọi món và văn hóa ăn uống.",
    image_seed: 205,
    image_prompt: "Anime style, Studio Ghibli style, A table full of dumplings and beef noodle soup, steam rising, warm lighting",
  },
  Chapter {
    id: "Bài 6",
    title: "Giao Thông (交通)",
    description: "Hỏi đường và các phương tiện đi lại.",
    image_seed: 206,
    image_prompt: "Anime style, Studio Ghibli style, MRT station in Taipei, people waiting for the train, clean and modern lines",
  },
];

fn line(speaker: &str, target: &str, native: &str) -> DialogueLine {
  DialogueLine { speaker: speaker.into(), target: target.into(), native: native.into() }
}

fn vocab(word: &str, meaning: &str, pronunciation: &str, han_viet: &str, category: &str) -> VocabularyItem {
  VocabularyItem {
    word: word.into(),
    meaning: meaning.into(),
    pronunciation: pronunciation.into(),
    han_viet: han_viet.into(),
    category: category.into(),
  }
}

fn grammar(title: &str, explanation: &str, example_target: &str, example_native: &str) -> GrammarPoint {
  GrammarPoint {
    title: title.into(),
    explanation: explanation.into(),
    example_target: example_target.into(),
    example_native: example_native.into(),
  }
}

fn quiz(question: &str, correct_sentence: &str, words: &[&str], explanation: &str) -> QuizItem {
  QuizItem {
    question: question.into(),
    correct_sentence: correct_sentence.into(),
    scrambled_words: words.iter().map(|w| w.to_string()).collect(),
    explanation: explanation.into(),
  }
}

/// Taiwanese learner, lesson 1 (Vietnamese greetings).
fn tw_greetings() -> LessonContent {
  LessonContent {
    title: "Xin Chào (打招呼)".into(),
    introduction: "歡迎來到第一課！在這裡我們將學習越南語中最基本的問候方式。越南語非常注重禮貌與輩分，因此「你」和「我」的說法會根據對象而改變。這堂課我們將一次掌握常用的稱呼與基本句型。".into(),
    dialogue: vec![
      line("Hùng (雄)", "Chào em, em tên là gì?", "你好(對晚輩)，你叫什麼名字？"),
      line("Lan (蘭)", "Em chào anh. Em tên là Lan ạ.", "哥哥你好。我叫小蘭。(加 'ạ' 表示敬語)"),
      line("Hùng (雄)", "Anh là người Việt Nam. Còn em?", "我是越南人。你呢？"),
      line("Lan (蘭)", "Em là người Đài Loan. Rất vui được làm quen với anh.", "我是台灣人。很高興認識你。"),
    ],
    vocabulary: vec![
      vocab("Xin chào", "你好 (通用/正式)", "sin tɕaːw", "漢越：欣朝", "慣用語"),
      vocab("Tạm biệt", "再見", "tam ɓiət", "漢越：暫別", "慣用語"),
      vocab("Cảm ơn", "謝謝", "kaːm əːn", "漢越：感恩", "慣用語"),
      vocab("Xin lỗi", "對不起/不好意思", "sin loj", "漢越：—", "慣用語"),
      vocab("Tôi", "我 (通用/正式)", "toj", "漢越：—", "代詞"),
      vocab("Bạn", "你 (平輩/朋友)", "ɓaːn", "漢越：伴", "代詞"),
      vocab("Anh", "哥哥 (稱呼稍長的男性/自稱)", "aɲ", "漢越：英", "代詞"),
      vocab("Chị", "姊姊 (稱呼稍長的女性/自稱)", "tɕi", "漢越：姊", "代詞"),
      vocab("Em", "弟弟/妹妹 (稱呼晚輩/自稱)", "ɛm", "漢越：—", "代詞"),
      vocab("Ông", "爺爺/先生 (尊稱長輩)", "oŋ", "漢越：翁", "代詞"),
      vocab("Bà", "奶奶/女士 (尊稱長輩)", "ɓaː", "漢越：婆", "代詞"),
      vocab("Thầy", "男老師", "tʰəj", "漢越：師", "名詞"),
      vocab("Cô", "女老師 / 姑姑 (爸爸的妹妹)", "ko", "漢越：姑", "名詞"),
      vocab("Dì", "阿姨 (媽媽的妹妹)", "zi (北) / ji (南)", "漢越：姨", "名詞"),
      vocab("Tên", "名字", "ten", "漢越：名", "名詞"),
      vocab("Là", "是", "laː", "漢越：羅", "動詞"),
      vocab("Gì", "什麼", "zi", "漢越：夷", "代詞"),
      vocab("Người", "人", "ŋɨəj", "漢越：—", "名詞"),
      vocab("Đài Loan", "台灣", "ɗaːj lwaːn", "漢越：臺灣", "名詞"),
      vocab("Việt Nam", "越南", "viət naːm", "漢越：越南", "名詞"),
      vocab("Rất", "很、非常", "zət", "漢越：—", "副詞"),
      vocab("Vui", "高興、快樂", "vuj", "漢越：—", "形容詞"),
      vocab("Khỏe", "健康 (用於問候)", "xwɛ", "漢越：—", "形容詞"),
    ],
    grammar: vec![
      grammar(
        "人稱代詞系統 (Anh / Chị / Em)",
        "越南語沒有通用的「你」或「我」，必須根據年齡與關係選擇代詞。對比自己大的男生叫 'Anh'，女生叫 'Chị'；對比自己小的叫 'Em'。自稱時也隨之改變 (例如對哥哥說話時，自稱 'Em')。",
        "Em chào anh.",
        "你好 (弟弟/妹妹 對 哥哥 打招呼)。",
      ),
      grammar(
        "句型：A là B (A 是 B)",
        "這是最基本的句子結構，類似英文的 'A is B' 或中文的 'A 是 B'。用來介紹名字、國籍或身分。",
        "Tôi là người Đài Loan.",
        "我是台灣人。",
      ),
      grammar(
        "句型：... không? (…嗎?)",
        "在句尾加上 'không' 會變成是非問句，相當於中文的「嗎」。",
        "Bạn khỏe không?",
        "你好嗎？(身體健康嗎？)",
      ),
    ],
    quiz: vec![
      quiz(
        "重組句子：我是小蘭。",
        "Tôi là Lan",
        &["Tôi", "là", "không", "Lan"],
        "基本句型：主詞 (Tôi) + 動詞 (là) + 受詞/補語 (Lan)。",
      ),
      quiz(
        "重組句子：很高興認識你。",
        "Rất vui được làm quen",
        &["Rất", "buồn", "vui", "được", "làm", "quen"],
        "固定慣用語：Rất vui được làm quen。",
      ),
      quiz(
        "重組句子：你是台灣人。",
        "Bạn là người Đài Loan",
        &["Bạn", "là", "Việt Nam", "người", "Đài Loan"],
        "主詞 (Bạn) + 是 (là) + 人 (người) + 台灣 (Đài Loan)。",
      ),
      quiz(
        "重組句子：你好嗎？",
        "Bạn khỏe không",
        &["Bạn", "chào", "khỏe", "không"],
        "主詞 (Bạn) + 形容詞 (khỏe) + 疑問詞 (không)。",
      ),
      quiz(
        "重組句子：再見。",
        "Tạm biệt",
        &["Xin", "Tạm", "biệt", "lỗi"],
        "Tạm biệt 是再見的意思。",
      ),
      quiz(
        "重組句子：我是越南人。",
        "Tôi là người Việt Nam",
        &["Tôi", "là", "người", "Đài Loan", "Việt Nam"],
        "主詞 (Tôi) + 是 (là) + 人 (người) + 越南 (Việt Nam)。",
      ),
    ],
  }
}

/// Vietnamese learner, lesson 1 (Chinese greetings).
fn vn_greetings() -> LessonContent {
  LessonContent {
    title: "Xin Chào (你好)".into(),
    introduction: "Chào mừng bạn đến với bài học đầu tiên! Tiếng Trung (Phồn thể) là ngôn ngữ chính tại Đài Loan. Trong bài này, chúng ta sẽ học 20 từ vựng cơ bản nhất, cách chào hỏi, giới thiệu tên và quốc tịch.".into(),
    dialogue: vec![
      line("Hùng", "你好！你叫什麼名字？", "Xin chào! Bạn tên là gì?"),
      line("Lan", "你好！我叫小蘭。", "Xin chào! Tôi tên là Tiểu Lan."),
      line("Hùng", "你是哪國人？", "Bạn là người nước nào?"),
      line("Lan", "我是越南人。很高興認識你。", "Tôi là người Việt Nam. Rất vui được làm quen với bạn."),
    ],
    vocabulary: vec![
      vocab("你好", "Xin chào", "nǐ hǎo", "Nhĩ Hảo", "Câu chào"),
      vocab("再見", "Tạm biệt", "zài jiàn", "Tái Kiến", "Câu chào"),
      vocab("謝謝", "Cảm ơn", "xiè xie", "Tạ Tạ", "Câu chào"),
      vocab("對不起", "Xin lỗi", "duì bu qǐ", "Đối Bất Khởi", "Câu chào"),
      vocab("我", "Tôi", "wǒ", "Ngã", "Đại từ"),
      vocab("你", "Bạn (Ngôi thứ 2)", "nǐ", "Nhĩ", "Đại từ"),
      vocab("他", "Anh ấy", "tā", "Tha", "Đại từ"),
      vocab("她", "Cô ấy", "tā", "Tha", "Đại từ"),
      vocab("叫", "Tên là / Gọi là", "jiào", "Khiếu", "Động từ"),
      vocab("什麼", "Cái gì", "shén me", "Thập Ma", "Đại từ"),
      vocab("名字", "Tên", "míng zi", "Danh Tự", "Danh từ"),
      vocab("是", "Là", "shì", "Thị", "Động từ"),
      vocab("人", "Người", "rén", "Nhân", "Danh từ"),
      vocab("台灣", "Đài Loan", "Tái wān", "Đài Loan", "Danh từ"),
      vocab("越南", "Việt Nam", "Yuè nán", "Việt Nam", "Danh từ"),
      vocab("很高興", "Rất vui", "hěn gāo xìng", "Hấn Cao Hứng", "Tính từ"),
      vocab("認識", "Quen biết", "rèn shì", "Nhận Thức", "Động từ"),
      vocab("老師", "Giáo viên", "lǎo shī", "Lão Sư", "Danh từ"),
      vocab("學生", "Học sinh", "xué shēng", "Học Sinh", "Danh từ"),
      vocab("好", "Tốt / Khỏe", "hǎo", "Hảo", "Tính từ"),
    ],
    grammar: vec![
      grammar(
        "Chào hỏi: 你好 (Nǐ hǎo)",
        "Đây là cách chào hỏi phổ biến nhất, dùng cho mọi đối tượng. 'Nǐ' (bạn) + 'Hǎo' (tốt).",
        "你好!",
        "Xin chào!",
      ),
      grammar(
        "Hỏi tên: 你叫什麼名字?",
        "Cấu trúc: Chủ ngữ + 叫 (gọi là) + 什麼 (gì) + 名字 (tên).",
        "你叫什麼名字?",
        "Bạn tên là gì?",
      ),
      grammar(
        "Cấu trúc: A 是 B (A là B)",
        "Dùng để giới thiệu thân phận hoặc quốc tịch. Chủ ngữ + 是 (là) + Danh từ.",
        "我是越南人。",
        "Tôi là người Việt Nam.",
      ),
    ],
    quiz: vec![
      quiz(
        "Sắp xếp câu: Tôi tên là Hùng.",
        "我 叫 阿 雄",
        &["我", "叫", "不", "阿", "雄"],
        "Cấu trúc: Chủ ngữ (我) + Động từ (叫) + Tên (阿雄). '不' là không, không cần dùng ở đây.",
      ),
      quiz(
        "Sắp xếp câu: Xin chào.",
        "你 好",
        &["你", "好", "嗎"],
        "Câu chào cơ bản là '你好'. '嗎' dùng để hỏi thăm sức khỏe (Bạn khỏe không?), không dùng trong câu chào đơn thuần.",
      ),
      quiz(
        "Sắp xếp câu: Bạn là người Đài Loan.",
        "你 是 台灣 人",
        &["你", "是", "台灣", "人", "嗎"],
        "Chủ ngữ (你) + Là (是) + Đài Loan (台灣) + Người (人).",
      ),
      quiz(
        "Sắp xếp câu: Rất vui được làm quen.",
        "很 高興 認識 你",
        &["很", "高興", "不", "認識", "你"],
        "Rất (很) + Vui (高興) + Quen biết (認識) + Bạn (你).",
      ),
      quiz(
        "Sắp xếp câu: Tạm biệt.",
        "再見",
        &["再見", "你好", "什麼"],
        "再見 nghĩa là Tạm biệt.",
      ),
      quiz(
        "Sắp xếp câu: Tôi là học sinh.",
        "我 是 學生",
        &["我", "是", "老師", "學生"],
        "Chủ ngữ (我) + Là (是) + Học sinh (學生).",
      ),
    ],
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn first_chapter_of_each_locale_is_seeded() {
    for locale in [Locale::Tw, Locale::Vn] {
      let first = &chapters(locale)[0];
      let lesson = lookup(locale, first.title).expect("seeded lesson");
      assert_eq!(lesson.title, first.title);
    }
  }

  #[test]
  fn lookup_is_keyed_by_locale_and_exact_topic() {
    assert!(lookup(Locale::Vn, "Xin Chào (打招呼)").is_none());
    assert!(lookup(Locale::Tw, "Số Đếm (數字)").is_none());
    assert!(lookup(Locale::Tw, "xin chào (打招呼)").is_none());
  }

  #[test]
  fn every_seeded_quiz_is_playable() {
    for locale in [Locale::Tw, Locale::Vn] {
      let lesson = lookup(locale, chapters(locale)[0].title).expect("seeded lesson");
      assert!(!lesson.quiz.is_empty());
      for q in &lesson.quiz {
        assert!(q.is_playable(), "unplayable seed quiz: {}", q.correct_sentence);
      }
    }
  }

  #[test]
  fn lookup_is_pure() {
    assert_eq!(lookup(Locale::Tw, "Xin Chào (打招呼)"), lookup(Locale::Tw, "Xin Chào (打招呼)"));
  }
}
